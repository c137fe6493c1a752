use std::fmt;
use strum_macros::EnumIter;

#[derive(Debug, thiserror::Error)]
#[error("{0} is not recognized, expected \"Density\", \"S_Mo\" or \"Number of layers\"")]
pub struct ParameterError(pub String);

/// Physical quantity mapped over the wafer
#[derive(EnumIter, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Parameter {
    /// Areal density [µg/cm²]
    Density,
    /// S/Mo atomic ratio
    AtomicRatio,
    /// Number of MoS2 monolayers
    Thickness,
}
impl Parameter {
    /// Column label in the slot tables and in the statistics tables
    pub fn column(&self) -> &'static str {
        match self {
            Parameter::Density => "Density",
            Parameter::AtomicRatio => "S_Mo",
            Parameter::Thickness => "Number of layers",
        }
    }
    /// Axis or colorbar label
    pub fn label(&self) -> &'static str {
        match self {
            Parameter::Density => "Density (µg.cm-2)",
            Parameter::AtomicRatio => "S/Mo atomic ratio",
            Parameter::Thickness => "Number of layers",
        }
    }
    /// Plot title, prefixed with the slot number if any
    pub fn title(&self, slot: Option<crate::SlotId>) -> String {
        match slot {
            Some(slot) => format!("S{} - {}", slot, self.label()),
            None => self.label().to_string(),
        }
    }
    /// Name of the per-slot interpolated grid file
    pub fn grid_file(&self) -> String {
        format!("{}_grid_df.csv", self.column())
    }
    /// Name of the cross-slot table file
    pub fn aggregate_file(&self) -> &'static str {
        match self {
            Parameter::Density => "Boxplot_Density.csv",
            Parameter::AtomicRatio => "Boxplot_S_Mo.csv",
            Parameter::Thickness => "Boxplot_Thickness.csv",
        }
    }
    /// Stem of the rendered map image
    pub fn image_stem(&self) -> &'static str {
        self.column()
    }
    /// Settings labels of the manual (min,max) color scale bounds
    pub fn bound_keys(&self) -> (&'static str, &'static str) {
        match self {
            Parameter::Density => ("Min density (ug.cm-2):", "Max density (ug.cm-2):"),
            Parameter::AtomicRatio => ("Min S/Mo:", "Max S/Mo:"),
            Parameter::Thickness => ("Min thickness (ML):", "Max thickness (ML):"),
        }
    }
}
impl TryFrom<&str> for Parameter {
    type Error = ParameterError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "Density" => Ok(Parameter::Density),
            "S_Mo" => Ok(Parameter::AtomicRatio),
            "Number of layers" | "Thickness" => Ok(Parameter::Thickness),
            other => Err(ParameterError(other.to_string())),
        }
    }
}
impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn lookup_table() {
        let files: Vec<_> = Parameter::iter().map(|p| p.grid_file()).collect();
        assert_eq!(
            files,
            vec![
                "Density_grid_df.csv",
                "S_Mo_grid_df.csv",
                "Number of layers_grid_df.csv"
            ]
        );
        assert_eq!(Parameter::Thickness.aggregate_file(), "Boxplot_Thickness.csv");
    }

    #[test]
    fn column_round_trip() {
        for p in Parameter::iter() {
            assert_eq!(Parameter::try_from(p.column()).unwrap(), p);
        }
        assert!(Parameter::try_from("X").is_err());
    }

    #[test]
    fn slot_title() {
        assert_eq!(
            Parameter::AtomicRatio.title(Some(7)),
            "S7 - S/Mo atomic ratio"
        );
    }
}
