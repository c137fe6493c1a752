//! Color scale bounds of the maps

use crate::{
    settings::MapSettings,
    stats::{CrossSlotTable, StatsError},
    Parameter, MAPPING_DIR,
};
use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};
use strum_macros::EnumIter;

#[derive(Debug, thiserror::Error)]
pub enum ScaleError {
    #[error("aggregate table {0:?} not found, run the statistics first")]
    MissingAggregate(PathBuf),
    #[error("failed to read the aggregate table")]
    Stats(#[from] StatsError),
    #[error("unknown scale mode {0:?}")]
    Mode(String),
}
type Result<T> = std::result::Result<T, ScaleError>;

/// Scale option of the mapping
#[derive(EnumIter, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScaleMode {
    #[default]
    Autoscale,
    IdenticalScale,
    IdenticalScaleAuto,
}
impl ScaleMode {
    /// How the bounds are resolved
    pub fn policy(&self) -> ScalePolicy {
        match self {
            ScaleMode::Autoscale => ScalePolicy::Manual,
            ScaleMode::IdenticalScale => ScalePolicy::PerWaferSet,
            ScaleMode::IdenticalScaleAuto => ScalePolicy::IdenticalAuto,
        }
    }
    /// Checks if the color map of the renderer is pinned to the resolved bounds
    pub fn pins_color_range(&self) -> bool {
        !matches!(self, ScaleMode::Autoscale)
    }
    /// Path of the map image of a quantity within a slot folder
    pub fn image_file(&self, parameter: Parameter) -> PathBuf {
        let name = match self {
            ScaleMode::Autoscale => format!("{}.png", parameter.image_stem()),
            _ => format!("{}_ID_scale.png", parameter.image_stem()),
        };
        Path::new(MAPPING_DIR).join(name)
    }
}
impl fmt::Display for ScaleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleMode::Autoscale => write!(f, "Autoscale"),
            ScaleMode::IdenticalScale => write!(f, "Identical scale"),
            ScaleMode::IdenticalScaleAuto => write!(f, "Identical scale auto"),
        }
    }
}
impl FromStr for ScaleMode {
    type Err = ScaleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "Autoscale" | "autoscale" => Ok(ScaleMode::Autoscale),
            "Identical scale" | "identical" => Ok(ScaleMode::IdenticalScale),
            "Identical scale auto" | "identical-auto" => Ok(ScaleMode::IdenticalScaleAuto),
            other => Err(ScaleError::Mode(other.to_string())),
        }
    }
}

/// Bounds resolution policies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalePolicy {
    /// user bounds, used as is
    Manual,
    /// user bounds shared by all the slots
    PerWaferSet,
    /// range of the values of all the slots
    IdenticalAuto,
}

/// Lower and upper color scale bounds, `None` if not supplied
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScaleBounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}
impl fmt::Display for ScaleBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |b: Option<f64>| b.map_or("-".to_string(), |b| format!("{:.3}", b));
        write!(f, "[{},{}]", bound(self.min), bound(self.max))
    }
}

/// Resolves the color scale bounds of each quantity
///
/// The resolver only reads the user bounds and the aggregate tables.
#[derive(Debug, Clone)]
pub struct ScaleResolver {
    policy: ScalePolicy,
    manual: HashMap<Parameter, ScaleBounds>,
    aggregate_dir: PathBuf,
}
impl ScaleResolver {
    /// Creates a resolver for the wafer set aggregate folder `aggregate_dir`
    pub fn new<P: Into<PathBuf>>(
        policy: ScalePolicy,
        settings: &MapSettings,
        aggregate_dir: P,
    ) -> Self {
        Self {
            policy,
            manual: settings.bounds.clone(),
            aggregate_dir: aggregate_dir.into(),
        }
    }
    pub fn policy(&self) -> ScalePolicy {
        self.policy
    }
    pub fn resolve(&self, parameter: Parameter) -> Result<ScaleBounds> {
        match self.policy {
            ScalePolicy::Manual | ScalePolicy::PerWaferSet => Ok(self
                .manual
                .get(&parameter)
                .copied()
                .unwrap_or_default()),
            ScalePolicy::IdenticalAuto => {
                let path = self.aggregate_dir.join(parameter.aggregate_file());
                if !path.exists() {
                    log::warn!("{:?} not found", path);
                    return Err(ScaleError::MissingAggregate(path));
                }
                let table = CrossSlotTable::read(&path, parameter)?;
                Ok(table
                    .min_max()
                    .map(|(min, max)| ScaleBounds {
                        min: Some(min),
                        max: Some(max),
                    })
                    .unwrap_or_default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::{DerivedPoint, SlotTable};
    use std::error::Error;

    fn table(values: &[f64]) -> SlotTable {
        values
            .iter()
            .map(|&v| DerivedPoint {
                x: 0.,
                y: 0.,
                density: v,
                s_mo: v,
                thickness: v,
            })
            .collect()
    }

    #[test]
    fn modes() -> std::result::Result<(), Box<dyn Error>> {
        let mode: ScaleMode = "Identical scale auto".parse()?;
        assert_eq!(mode.policy(), ScalePolicy::IdenticalAuto);
        assert!(mode.pins_color_range());
        assert!(!ScaleMode::Autoscale.pins_color_range());
        assert_eq!(
            ScaleMode::IdenticalScale.image_file(Parameter::AtomicRatio),
            Path::new("Mapping").join("S_Mo_ID_scale.png")
        );
        assert!("Logscale".parse::<ScaleMode>().is_err());
        Ok(())
    }

    #[test]
    fn manual_bounds() -> std::result::Result<(), Box<dyn Error>> {
        let settings = MapSettings::default();
        let resolver = ScaleResolver::new(ScalePolicy::Manual, &settings, "/no/such/dir");
        assert_eq!(
            resolver.resolve(Parameter::AtomicRatio)?,
            ScaleBounds {
                min: Some(0.),
                max: Some(3.)
            }
        );
        Ok(())
    }

    #[test]
    fn identical_auto_is_order_independent() -> std::result::Result<(), Box<dyn Error>> {
        let dir = std::env::temp_dir().join(format!("wdxrf-scale-{}", std::process::id()));
        std::fs::create_dir_all(&dir)?;
        let settings = MapSettings::default();
        let resolver = ScaleResolver::new(ScalePolicy::IdenticalAuto, &settings, &dir);
        assert!(matches!(
            resolver.resolve(Parameter::Density),
            Err(ScaleError::MissingAggregate(_))
        ));
        let (a, b) = (table(&[3., f64::NAN, 7.]), table(&[-1., 4.]));
        let path = dir.join(Parameter::Density.aggregate_file());
        CrossSlotTable::new(Parameter::Density, [(1, &a), (2, &b)]).write(&path)?;
        let forward = resolver.resolve(Parameter::Density)?;
        CrossSlotTable::new(Parameter::Density, [(1, &b), (2, &a)]).write(&path)?;
        let backward = resolver.resolve(Parameter::Density)?;
        assert_eq!(forward, backward);
        assert_eq!(
            forward,
            ScaleBounds {
                min: Some(-1.),
                max: Some(7.)
            }
        );
        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
