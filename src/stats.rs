//! Slot statistics
//!
//! Per-slot summaries of the derived quantities, the cross-slot statistics table and the
//! boxplot tables with one column per slot.

use crate::{
    parameter::ParameterError, scanner::ScanError, scanner::WaferSet, slot::SlotTable,
    Parameter, SlotId, STATS_FILE,
};
use itertools::{Itertools, MinMaxResult};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};
use strum::IntoEnumIterator;

#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("statistics file {0:?} not found")]
    Missing(PathBuf),
    #[error("failed to read or write statistics")]
    Csv(#[from] csv::Error),
    #[error("failed to write {0:?}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("unknown parameter in statistics")]
    Parameter(#[from] ParameterError),
    #[error("failed to create the statistics folder")]
    Scan(#[from] ScanError),
}
type Result<T> = std::result::Result<T, StatsError>;

fn nan_to_none(value: f64) -> Option<f64> {
    (!value.is_nan()).then_some(value)
}
fn format_value(value: Option<f64>) -> String {
    value.map(|v| format!("{:?}", v)).unwrap_or_default()
}

/// Summary statistics of one quantity, NaN samples excluded
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterStatistics {
    pub parameter: Parameter,
    pub count: usize,
    pub mean: f64,
    /// sample standard deviation
    pub std: f64,
    pub min: f64,
    pub max: f64,
}
impl ParameterStatistics {
    pub fn new(parameter: Parameter, values: impl IntoIterator<Item = f64>) -> Self {
        let values: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
        let n = values.len();
        let mean = values.iter().sum::<f64>() / n as f64;
        let std = if n > 1 {
            (values.iter().map(|x| x - mean).fold(0f64, |s, x| s + x * x) / (n - 1) as f64)
                .sqrt()
        } else {
            f64::NAN
        };
        let (min, max) = match values.iter().minmax() {
            MinMaxResult::MinMax(min, max) => (*min, *max),
            MinMaxResult::OneElement(v) => (*v, *v),
            MinMaxResult::NoElements => (f64::NAN, f64::NAN),
        };
        Self {
            parameter,
            count: n,
            mean,
            std,
            min,
            max,
        }
    }
    /// Three times the standard deviation
    pub fn three_sigma(&self) -> f64 {
        3. * self.std
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SummaryRecord {
    #[serde(rename = "Parameters")]
    parameter: String,
    mean: Option<f64>,
    #[serde(rename = "3sigma")]
    three_sigma: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
    #[serde(rename = "Slot")]
    slot: SlotId,
}

/// Statistics of all the quantities of a slot
#[derive(Debug, Clone, PartialEq)]
pub struct SlotStatistics {
    pub slot: SlotId,
    pub parameters: Vec<ParameterStatistics>,
}
impl SlotStatistics {
    pub fn new(slot: SlotId, table: &SlotTable) -> Self {
        Self {
            slot,
            parameters: Parameter::iter()
                .map(|parameter| ParameterStatistics::new(parameter, table.values(parameter)))
                .collect(),
        }
    }
    pub fn get(&self, parameter: Parameter) -> Option<&ParameterStatistics> {
        self.parameters.iter().find(|s| s.parameter == parameter)
    }
    /// Saves the summary to the `Parameters.csv` file of the slot
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut wtr = csv::Writer::from_path(path)?;
        for s in &self.parameters {
            wtr.serialize(SummaryRecord {
                parameter: s.parameter.column().to_string(),
                mean: nan_to_none(s.mean),
                three_sigma: nan_to_none(s.three_sigma()),
                min: nan_to_none(s.min),
                max: nan_to_none(s.max),
                slot: self.slot,
            })?;
        }
        wtr.flush()
            .map_err(|e| StatsError::Io(path.to_path_buf(), e))?;
        log::info!("{:?} saved", path);
        Ok(())
    }
}

/// Mean, 3σ and uniformity of a quantity, displayed on the slot maps
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Annotation {
    pub mean: f64,
    pub three_sigma: f64,
    /// `(1 - 3σ/mean) x 100`, clipped at 0
    pub uniformity: f64,
}
impl Annotation {
    pub fn new(mean: f64, three_sigma: f64) -> Self {
        let uniformity = if mean == 0. {
            0.
        } else {
            // f64::max discards a NaN uniformity
            ((1. - three_sigma / mean) * 100.).max(0.)
        };
        Self {
            mean,
            three_sigma,
            uniformity,
        }
    }
}
impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Mean: {:.2} 3σ: {:.2} U: {:.1}%",
            self.mean, self.three_sigma, self.uniformity
        )
    }
}

/// A row of the cross-slot statistics table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsRecord {
    #[serde(rename = "Slot")]
    pub slot: SlotId,
    #[serde(rename = "Parameters")]
    pub parameter: String,
    pub mean: Option<f64>,
    #[serde(rename = "3sigma")]
    pub three_sigma: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// The statistics of all the slots of a wafer set (`Stats.csv`)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrossSlotStatistics {
    records: Vec<StatsRecord>,
}
impl CrossSlotStatistics {
    /// Merges the slot statistics, sorted by slot and parameter
    pub fn new(slots: impl IntoIterator<Item = SlotStatistics>) -> Self {
        let mut slots: Vec<_> = slots.into_iter().collect();
        slots.sort_by_key(|s| s.slot);
        let records = slots
            .into_iter()
            .flat_map(|s| {
                let slot = s.slot;
                s.parameters.into_iter().map(move |p| StatsRecord {
                    slot,
                    parameter: p.parameter.column().to_string(),
                    mean: nan_to_none(p.mean),
                    three_sigma: nan_to_none(p.three_sigma()),
                    min: nan_to_none(p.min),
                    max: nan_to_none(p.max),
                })
            })
            .collect();
        Self { records }
    }
    pub fn records(&self) -> &[StatsRecord] {
        &self.records
    }
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut wtr = csv::Writer::from_path(path)?;
        if self.is_empty() {
            wtr.write_record(["Slot", "Parameters", "mean", "3sigma", "min", "max"])?;
        }
        for record in &self.records {
            wtr.serialize(record)?;
        }
        wtr.flush()
            .map_err(|e| StatsError::Io(path.to_path_buf(), e))?;
        log::info!("{:?} saved", path);
        Ok(())
    }
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StatsError::Missing(path.to_path_buf()));
        }
        log::info!("Loading {:?}...", path);
        let mut rdr = csv::Reader::from_path(path)?;
        let records = rdr
            .deserialize::<StatsRecord>()
            .map(|record| -> Result<StatsRecord> {
                let record = record?;
                Parameter::try_from(record.parameter.as_str())?;
                Ok(record)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { records })
    }
    /// Returns the annotation of a slot quantity
    pub fn annotation(&self, slot: SlotId, parameter: Parameter) -> Option<Annotation> {
        let record = self
            .records
            .iter()
            .find(|r| r.slot == slot && r.parameter == parameter.column());
        match record {
            Some(StatsRecord {
                mean: Some(mean),
                three_sigma,
                ..
            }) => Some(Annotation::new(*mean, three_sigma.unwrap_or(f64::NAN))),
            _ => {
                log::warn!("No data found for slot {} and {}", slot, parameter);
                None
            }
        }
    }
}

/// The values of a quantity with one column per slot (`Boxplot_*.csv`)
///
/// Columns are sorted by slot number and rows aligned by measurement index.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossSlotTable {
    parameter: Parameter,
    labels: Vec<String>,
    columns: BTreeMap<SlotId, Vec<Option<f64>>>,
}
impl CrossSlotTable {
    /// Builds the table from the slot tables, empty tables are skipped
    pub fn new<'a>(
        parameter: Parameter,
        tables: impl IntoIterator<Item = (SlotId, &'a SlotTable)>,
    ) -> Self {
        let tables: BTreeMap<SlotId, &SlotTable> = tables
            .into_iter()
            .filter(|(_, table)| !table.is_empty())
            .collect();
        let n_row = tables.values().map(|t| t.len()).max().unwrap_or_default();
        let labels = (0..n_row)
            .map(|i| {
                tables
                    .values()
                    .find_map(|t| t.get(i))
                    .map(|p| format!("{:?} / {:?}", p.x, p.y))
                    .unwrap_or_default()
            })
            .collect();
        let columns = tables
            .into_iter()
            .map(|(slot, table)| {
                let mut column: Vec<_> = table.values(parameter).map(nan_to_none).collect();
                column.resize(n_row, None);
                (slot, column)
            })
            .collect();
        Self {
            parameter,
            labels,
            columns,
        }
    }
    pub fn parameter(&self) -> Parameter {
        self.parameter
    }
    /// Slot numbers in ascending order
    pub fn slots(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.columns.keys().copied()
    }
    pub fn column(&self, slot: SlotId) -> Option<&[Option<f64>]> {
        self.columns.get(&slot).map(|c| c.as_slice())
    }
    pub fn n_row(&self) -> usize {
        self.columns.values().map(|c| c.len()).max().unwrap_or_default()
    }
    /// Range of the finite values of all the slots
    pub fn min_max(&self) -> Option<(f64, f64)> {
        match self
            .columns
            .values()
            .flatten()
            .flatten()
            .filter(|v| v.is_finite())
            .minmax()
        {
            MinMaxResult::MinMax(min, max) => Some((*min, *max)),
            MinMaxResult::OneElement(v) => Some((*v, *v)),
            MinMaxResult::NoElements => None,
        }
    }
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(
            std::iter::once("X_Y".to_string()).chain(self.slots().map(|s| s.to_string())),
        )?;
        for (i, label) in self.labels.iter().enumerate() {
            wtr.write_record(
                std::iter::once(label.clone()).chain(
                    self.columns
                        .values()
                        .map(|c| format_value(c.get(i).copied().flatten())),
                ),
            )?;
        }
        wtr.flush()
            .map_err(|e| StatsError::Io(path.to_path_buf(), e))?;
        log::info!("{:?} saved", path);
        Ok(())
    }
    /// Reads a table, the columns whose label is not a slot number are dropped
    pub fn read<P: AsRef<Path>>(path: P, parameter: Parameter) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StatsError::Missing(path.to_path_buf()));
        }
        log::info!("Loading {:?}...", path);
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let slots: Vec<(usize, SlotId)> = rdr
            .headers()?
            .iter()
            .enumerate()
            .filter_map(|(i, label)| parse_slot(label).map(|slot| (i, slot)))
            .collect();
        let mut columns: BTreeMap<SlotId, Vec<Option<f64>>> =
            slots.iter().map(|&(_, slot)| (slot, vec![])).collect();
        let mut labels = vec![];
        for record in rdr.records() {
            let record = record?;
            labels.push(record.get(0).unwrap_or_default().to_string());
            for &(i, slot) in &slots {
                let value = record
                    .get(i)
                    .and_then(|v| v.trim().parse::<f64>().ok())
                    .and_then(nan_to_none);
                columns.entry(slot).or_default().push(value);
            }
        }
        Ok(Self {
            parameter,
            labels,
            columns,
        })
    }
}
fn parse_slot(label: &str) -> Option<SlotId> {
    let label = label.trim();
    label.parse::<SlotId>().ok().or_else(|| {
        label
            .parse::<f64>()
            .ok()
            .filter(|v| v.fract() == 0. && *v >= 0. && *v <= SlotId::MAX as f64)
            .map(|v| v as SlotId)
    })
}

/// Computes and saves the cross-slot tables of a wafer set
pub struct StatisticsAggregator<'a> {
    set: &'a WaferSet,
}
impl<'a> StatisticsAggregator<'a> {
    pub fn new(set: &'a WaferSet) -> Self {
        Self { set }
    }
    /// Writes `Stats.csv` and the boxplot tables into the aggregate folder
    pub fn run(
        &self,
        summaries: Vec<SlotStatistics>,
        tables: &BTreeMap<SlotId, SlotTable>,
    ) -> Result<CrossSlotStatistics> {
        let aggregate_dir = self.set.aggregate_dir()?;
        let stats = CrossSlotStatistics::new(summaries);
        stats.write(aggregate_dir.join(STATS_FILE))?;
        for parameter in Parameter::iter() {
            CrossSlotTable::new(parameter, tables.iter().map(|(&slot, table)| (slot, table)))
                .write(aggregate_dir.join(parameter.aggregate_file()))?;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::DerivedPoint;
    use std::error::Error;

    fn table(densities: &[f64]) -> SlotTable {
        densities
            .iter()
            .enumerate()
            .map(|(i, &density)| DerivedPoint {
                x: i as f64,
                y: -(i as f64) / 2.,
                density,
                s_mo: 2.,
                thickness: density / 10.,
            })
            .collect()
    }

    #[test]
    fn describe() {
        let s = ParameterStatistics::new(Parameter::Density, [1., 2., f64::NAN, 3., 6.]);
        assert_eq!(s.count, 4);
        assert_eq!(s.mean, 3.);
        assert_eq!(s.std, (14f64 / 3.).sqrt());
        assert_eq!(s.three_sigma(), 3. * s.std);
        assert_eq!((s.min, s.max), (1., 6.));
        let single = ParameterStatistics::new(Parameter::Density, [1.]);
        assert!(single.std.is_nan());
    }

    #[test]
    fn uniformity() {
        assert!((Annotation::new(10., 1.).uniformity - 90.).abs() < 1e-9);
        assert_eq!(Annotation::new(1., 3.).uniformity, 0.);
        assert_eq!(Annotation::new(0., 3.).uniformity, 0.);
    }

    #[test]
    fn stats_rows() -> std::result::Result<(), Box<dyn Error>> {
        let stats = CrossSlotStatistics::new(vec![
            SlotStatistics::new(10, &table(&[1., 2.])),
            SlotStatistics::new(2, &table(&[4., 5., 6.])),
        ]);
        assert_eq!(stats.len(), 2 * 3);
        let order: Vec<_> = stats
            .records()
            .iter()
            .map(|r| (r.slot, r.parameter.as_str()))
            .collect();
        assert_eq!(order[0], (2, "Density"));
        assert_eq!(order[2], (2, "Number of layers"));
        assert_eq!(order[3], (10, "Density"));
        let path = std::env::temp_dir().join(format!("wdxrf-stats-{}.csv", std::process::id()));
        stats.write(&path)?;
        let contents = std::fs::read_to_string(&path)?;
        assert!(contents.starts_with("Slot,Parameters,mean,3sigma,min,max\n2,Density,5.0,3.0,4.0,6.0\n"));
        let loaded = CrossSlotStatistics::read(&path)?;
        assert_eq!(loaded, stats);
        let annotation = loaded.annotation(2, Parameter::Density).unwrap();
        assert!((annotation.uniformity - 40.).abs() < 1e-9);
        assert!(loaded.annotation(3, Parameter::Density).is_none());
        std::fs::remove_file(&path)?;
        Ok(())
    }

    #[test]
    fn boxplot_padding_and_order() -> std::result::Result<(), Box<dyn Error>> {
        let (t10, t2) = (table(&[1., 2., 3.]), table(&[4., 5.]));
        let boxplot = CrossSlotTable::new(Parameter::Density, [(10, &t10), (2, &t2)]);
        assert_eq!(boxplot.slots().collect::<Vec<_>>(), vec![2, 10]);
        assert_eq!(boxplot.n_row(), 3);
        assert_eq!(boxplot.column(2), Some(&[Some(4.), Some(5.), None][..]));
        assert_eq!(boxplot.min_max(), Some((1., 5.)));
        let path = std::env::temp_dir().join(format!("wdxrf-boxplot-{}.csv", std::process::id()));
        boxplot.write(&path)?;
        let contents = std::fs::read_to_string(&path)?;
        assert_eq!(
            contents,
            "X_Y,2,10\n0.0 / -0.0,4.0,1.0\n1.0 / -0.5,5.0,2.0\n2.0 / -1.0,,3.0\n"
        );
        let loaded = CrossSlotTable::read(&path, Parameter::Density)?;
        assert_eq!(loaded, boxplot);
        std::fs::remove_file(&path)?;
        Ok(())
    }

    #[test]
    fn boxplot_drops_non_slot_columns() -> std::result::Result<(), Box<dyn Error>> {
        let path = std::env::temp_dir().join(format!("wdxrf-labels-{}.csv", std::process::id()));
        std::fs::write(&path, "X_Y,1,notes,3.0\na,1.5,x,nan\nb,,y,-2\n")?;
        let boxplot = CrossSlotTable::read(&path, Parameter::AtomicRatio)?;
        assert_eq!(boxplot.slots().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(boxplot.min_max(), Some((-2., 1.5)));
        std::fs::remove_file(&path)?;
        Ok(())
    }
}
