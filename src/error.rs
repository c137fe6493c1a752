use crate::{
    batch::SlotError, grid::GridError, parameter::ParameterError, raw::RawError,
    scale::ScaleError, scanner::ScanError, settings::SettingsError, slot::SlotTableError,
    stats::StatsError,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error in the `raw` module")]
    Raw(#[from] RawError),
    #[error("Error in the `slot` module")]
    SlotTable(#[from] SlotTableError),
    #[error("Error in the `scanner` module")]
    Scan(#[from] ScanError),
    #[error("Error in the `grid` module")]
    Grid(#[from] GridError),
    #[error("Error in the `stats` module")]
    Stats(#[from] StatsError),
    #[error("Error in the `scale` module")]
    Scale(#[from] ScaleError),
    #[error("Error in the `settings` module")]
    Settings(#[from] SettingsError),
    #[error("Error in the `parameter` module")]
    Parameter(#[from] ParameterError),
    #[error(transparent)]
    Slot(#[from] SlotError),
    #[error("failed to build the worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
