//! Slot tables
//!
//! The derived quantities of one slot, saved as `data_DP.csv` in the slot folder.

use crate::{
    quantity::QuantityCalculator,
    raw::{RawError, RawExport, RawLayout},
    Parameter,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SlotTableError {
    #[error("failed to read the raw export")]
    Raw(#[from] RawError),
    #[error("slot table {0:?} not found")]
    Missing(PathBuf),
    #[error("failed to read or write the slot table")]
    Csv(#[from] csv::Error),
    #[error("failed to write the slot table")]
    Io(#[from] std::io::Error),
}
type Result<T> = std::result::Result<T, SlotTableError>;

#[derive(Deserialize, Serialize, Debug)]
struct Record {
    #[serde(rename = "X")]
    x: Option<f64>,
    #[serde(rename = "Y")]
    y: Option<f64>,
    #[serde(rename = "Density")]
    density: Option<f64>,
    #[serde(rename = "S_Mo")]
    s_mo: Option<f64>,
    #[serde(rename = "Number of layers")]
    thickness: Option<f64>,
}
fn nan_to_none(value: f64) -> Option<f64> {
    (!value.is_nan()).then_some(value)
}
impl From<&DerivedPoint> for Record {
    fn from(p: &DerivedPoint) -> Self {
        Self {
            x: nan_to_none(p.x),
            y: nan_to_none(p.y),
            density: nan_to_none(p.density),
            s_mo: nan_to_none(p.s_mo),
            thickness: nan_to_none(p.thickness),
        }
    }
}
impl From<Record> for DerivedPoint {
    fn from(r: Record) -> Self {
        Self {
            x: r.x.unwrap_or(f64::NAN),
            y: r.y.unwrap_or(f64::NAN),
            density: r.density.unwrap_or(f64::NAN),
            s_mo: r.s_mo.unwrap_or(f64::NAN),
            thickness: r.thickness.unwrap_or(f64::NAN),
        }
    }
}

/// Wafer coordinates [cm] and physical quantities of a measured point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedPoint {
    pub x: f64,
    pub y: f64,
    /// areal density [µg/cm²]
    pub density: f64,
    /// S/Mo atomic ratio
    pub s_mo: f64,
    /// number of layers
    pub thickness: f64,
}
impl DerivedPoint {
    /// Returns the value of a given quantity
    pub fn get(&self, parameter: Parameter) -> f64 {
        match parameter {
            Parameter::Density => self.density,
            Parameter::AtomicRatio => self.s_mo,
            Parameter::Thickness => self.thickness,
        }
    }
    /// Checks that all the quantities are finite
    pub fn is_defined(&self) -> bool {
        [self.x, self.y, self.density, self.s_mo, self.thickness]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// The [DerivedPoint]s of a slot in measurement order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotTable(Vec<DerivedPoint>);
impl std::ops::Deref for SlotTable {
    type Target = Vec<DerivedPoint>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
impl From<Vec<DerivedPoint>> for SlotTable {
    fn from(points: Vec<DerivedPoint>) -> Self {
        Self(points)
    }
}
impl FromIterator<DerivedPoint> for SlotTable {
    fn from_iter<T: IntoIterator<Item = DerivedPoint>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
impl SlotTable {
    /// Derives the table of a raw export
    pub fn from_raw<P: AsRef<Path>>(
        path: P,
        layout: &RawLayout,
        calculator: &QuantityCalculator,
    ) -> Result<Self> {
        let export = RawExport::from_path(path, layout)?;
        let table: SlotTable = calculator.derive_all(&export.measurements).collect();
        let n_undefined = table.iter().filter(|p| !p.is_defined()).count();
        if n_undefined > 0 {
            log::warn!("{} points with undefined S/Mo ratio or thickness", n_undefined);
        }
        Ok(table)
    }
    /// Loads a `data_DP.csv` file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SlotTableError::Missing(path.to_path_buf()));
        }
        log::info!("Loading {:?}...", path);
        let mut rdr = csv::Reader::from_path(path)?;
        rdr.deserialize::<Record>()
            .map(|result| result.map(DerivedPoint::from).map_err(SlotTableError::from))
            .collect()
    }
    /// Saves the table to a `data_DP.csv` file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut wtr = csv::Writer::from_path(path)?;
        if self.is_empty() {
            wtr.write_record(["X", "Y", "Density", "S_Mo", "Number of layers"])?;
        }
        for point in self.iter() {
            wtr.serialize(Record::from(point))?;
        }
        wtr.flush()?;
        log::info!("{:?} saved ({} points)", path, self.len());
        Ok(())
    }
    /// Iterator over the values of a given quantity
    pub fn values(&self, parameter: Parameter) -> impl Iterator<Item = f64> + '_ {
        self.iter().map(move |p| p.get(parameter))
    }
    /// Iterator over the `(x, y, value)` samples of a given quantity that are all finite
    pub fn samples(&self, parameter: Parameter) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.iter()
            .map(move |p| (p.x, p.y, p.get(parameter)))
            .filter(|(x, y, v)| x.is_finite() && y.is_finite() && v.is_finite())
    }
}
