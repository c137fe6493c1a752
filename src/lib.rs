//! Wafer-scale WDXRF mapping
//!
//! Converts the per-point spectrometer exports of a wafer set into physical quantities
//! (areal density, S/Mo atomic ratio, number of MoS2 layers), interpolates them onto a
//! regular grid bounded by the wafer edge exclusion and aggregates the statistics of all
//! the slots of the set.
//!
//! A wafer set is a directory with one numbered sub-directory per slot:
//! ```text
//! D24S1647.1/
//! ├── 1/
//! │   ├── <raw export>.csv
//! │   ├── data_DP.csv
//! │   ├── Mask.npy
//! │   ├── Density_grid_df.csv
//! │   └── Mapping/
//! ├── 2/
//! └── Liste_data/
//!     ├── Stats.csv
//!     └── Boxplot_Density.csv
//! ```

pub mod batch;
pub mod coordinates;
pub mod error;
pub mod grid;
pub mod parameter;
pub mod quantity;
pub mod raw;
pub mod scale;
pub mod scanner;
pub mod settings;
pub mod slot;
pub mod stats;

pub use batch::{BatchReport, MapOptions, SlotError, SlotReport, WaferBatchProcessor};
pub use error::Error;
pub use grid::{BoundaryMask, GridInterpolator, InterpolatedField, UniformGrid};
pub use parameter::Parameter;
pub use quantity::{MaterialConstants, QuantityCalculator};
pub use raw::{RawExport, RawLayout, RawMeasurement};
pub use scale::{ScaleBounds, ScaleMode, ScalePolicy, ScaleResolver};
pub use scanner::WaferSet;
pub use settings::{MapSettings, SettingsStore};
pub use slot::{DerivedPoint, SlotTable};
pub use stats::{
    Annotation, CrossSlotStatistics, CrossSlotTable, SlotStatistics, StatisticsAggregator,
};

/// Slot identifier: the integer name of the slot directory
pub type SlotId = u32;

/// Per-slot table of derived quantities
pub const DATA_FILE: &str = "data_DP.csv";
/// Per-slot statistics summary
pub const SLOT_SUMMARY_FILE: &str = "Parameters.csv";
/// Per-slot boundary mask
pub const MASK_FILE: &str = "Mask.npy";
/// Per-slot folder for the rendered maps
pub const MAPPING_DIR: &str = "Mapping";
/// Wafer set folder for the cross-slot tables
pub const AGGREGATE_DIR: &str = "Liste_data";
/// Wafer set folder for the composite figures
pub const FIGURES_DIR: &str = "Graphe";
/// Cross-slot statistics table
pub const STATS_FILE: &str = "Stats.csv";
