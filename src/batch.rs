//! Wafer set batch processing
//!
//! The processing of a wafer set runs in 3 phases:
//!  1. derive: the raw export of each slot is converted into a slot table (parallel)
//!  2. aggregate: the slot statistics and the cross-slot tables are computed
//!  3. map: the quantities of each slot are interpolated on the wafer grid (parallel)
//!
//! A failure in one slot is recorded in the [BatchReport] and never stops the other slots.

use crate::{
    grid::{BoundaryMask, GridError, GridInterpolator},
    quantity::QuantityCalculator,
    raw::RawLayout,
    scale::{ScaleBounds, ScaleError, ScaleMode, ScaleResolver},
    scanner::{ScanError, Slot, WaferSet},
    settings::MapSettings,
    slot::{SlotTable, SlotTableError},
    stats::{
        Annotation, CrossSlotStatistics, SlotStatistics, StatisticsAggregator, StatsError,
    },
    Error, Parameter, SlotId, STATS_FILE,
};
use indicatif::{ParallelProgressIterator, ProgressBar};
use rayon::prelude::*;
use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};
use strum::IntoEnumIterator;

/// Causes of a slot failure
#[derive(Debug, thiserror::Error)]
pub enum SlotFailure {
    #[error("no raw export")]
    NoRawExport,
    #[error(transparent)]
    Table(#[from] SlotTableError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Stats(#[from] StatsError),
}

/// A failure isolated to one slot
#[derive(Debug, thiserror::Error)]
#[error("slot {slot} failed: {source}")]
pub struct SlotError {
    pub slot: SlotId,
    #[source]
    pub source: SlotFailure,
}

/// Batch phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Derive,
    Aggregate,
    Map,
}
impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Derive => write!(f, "derive"),
            Phase::Aggregate => write!(f, "aggregate"),
            Phase::Map => write!(f, "map"),
        }
    }
}

/// Options of the mapping phase
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MapOptions {
    /// color scale option
    pub scale: ScaleMode,
    /// annotate the maps with the slot statistics
    pub stats: bool,
    /// prefix the map titles with the slot number
    pub slot_number: bool,
}

/// The map of one quantity of a slot, ready for rendering
#[derive(Debug)]
pub struct ParameterMap {
    pub parameter: Parameter,
    /// pivoted grid file
    pub grid_file: PathBuf,
    /// number of valid grid nodes, 0 for a "no data" map
    pub n_valid: usize,
    /// color scale bounds, or why they could not be resolved
    pub bounds: std::result::Result<ScaleBounds, ScaleError>,
    pub pins_color_range: bool,
    /// image path for the renderer
    pub image: PathBuf,
    pub title: String,
    pub annotation: Option<Annotation>,
}

/// Outcome of a successful slot phase
#[derive(Debug)]
pub struct SlotReport {
    pub slot: SlotId,
    pub phase: Phase,
    /// files written
    pub outputs: Vec<PathBuf>,
    pub maps: Vec<ParameterMap>,
}
impl SlotReport {
    fn new(slot: SlotId, phase: Phase, outputs: Vec<PathBuf>) -> Self {
        Self {
            slot,
            phase,
            outputs,
            maps: vec![],
        }
    }
}

/// Per-slot outcomes of a batch
#[derive(Debug, Default)]
pub struct BatchReport {
    pub slots: Vec<SlotReport>,
    pub errors: Vec<SlotError>,
}
impl BatchReport {
    fn from_results(results: Vec<std::result::Result<SlotReport, SlotError>>) -> Self {
        let mut report = BatchReport::default();
        for result in results {
            match result {
                Ok(slot) => report.slots.push(slot),
                Err(e) => {
                    log::warn!("{}", e);
                    report.errors.push(e)
                }
            }
        }
        report.slots.sort_by_key(|s| s.slot);
        report.errors.sort_by_key(|e| e.slot);
        report
    }
    /// Appends the outcomes of another phase
    pub fn merge(&mut self, other: BatchReport) {
        self.slots.extend(other.slots);
        self.errors.extend(other.errors);
    }
    /// Checks if no slot failed
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
    /// Slots that failed in any phase
    pub fn failed_slots(&self) -> Vec<SlotId> {
        let mut slots: Vec<_> = self.errors.iter().map(|e| e.slot).collect();
        slots.sort();
        slots.dedup();
        slots
    }
}
impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.slots {
            writeln!(
                f,
                "slot {:>3} [{}]: {} file(s) written",
                report.slot,
                report.phase,
                report.outputs.len()
            )?;
            for map in &report.maps {
                let bounds = match &map.bounds {
                    Ok(bounds) => bounds.to_string(),
                    Err(e) => e.to_string(),
                };
                write!(
                    f,
                    " - {:<18} {:>5} nodes, scale {}",
                    map.parameter.to_string(),
                    map.n_valid,
                    bounds
                )?;
                if let Some(annotation) = map.annotation {
                    write!(f, ", {}", annotation)?;
                }
                writeln!(f)?;
            }
        }
        for e in &self.errors {
            writeln!(f, "{}", e)?;
        }
        Ok(())
    }
}

/// Read-only inputs of the mapping of one slot
struct SlotTask {
    slot: Slot,
    settings: Arc<MapSettings>,
    resolver: Arc<ScaleResolver>,
    stats: Option<Arc<CrossSlotStatistics>>,
    options: MapOptions,
}
impl SlotTask {
    fn run(&self) -> std::result::Result<SlotReport, SlotFailure> {
        let table = SlotTable::load(self.slot.data_file())?;
        self.slot.mapping_dir()?;
        let interpolator = GridInterpolator::from_settings(&self.settings)?;
        // the maps are masked with the mask read back from file
        let mask_file = self.slot.mask_file();
        interpolator.mask().save(&mask_file)?;
        let mask = BoundaryMask::load(&mask_file)?;
        let mut report = SlotReport::new(self.slot.id, Phase::Map, vec![mask_file]);
        for parameter in Parameter::iter() {
            let mut field = interpolator.interpolate(&table, parameter);
            field.apply_mask(&mask)?;
            let grid_file = self.slot.path.join(parameter.grid_file());
            field.to_csv(&grid_file)?;
            let bounds = self.resolver.resolve(parameter);
            if let Err(e) = &bounds {
                log::warn!("slot {} {}: {}", self.slot.id, parameter, e);
            }
            let annotation = self
                .stats
                .as_ref()
                .filter(|_| self.options.stats)
                .and_then(|stats| stats.annotation(self.slot.id, parameter));
            report.outputs.push(grid_file.clone());
            report.maps.push(ParameterMap {
                parameter,
                grid_file,
                n_valid: field.n_valid(),
                bounds,
                pins_color_range: self.options.scale.pins_color_range(),
                image: self.slot.path.join(self.options.scale.image_file(parameter)),
                title: parameter.title(self.options.slot_number.then_some(self.slot.id)),
                annotation,
            });
        }
        Ok(report)
    }
}

/// Batch processor of a wafer set
pub struct WaferBatchProcessor {
    set: WaferSet,
    settings: Arc<MapSettings>,
    layout: RawLayout,
    calculator: QuantityCalculator,
    n_thread: usize,
    progress: bool,
}
impl WaferBatchProcessor {
    pub fn new(set: WaferSet, settings: MapSettings) -> Self {
        Self {
            set,
            settings: Arc::new(settings),
            layout: RawLayout::default(),
            calculator: QuantityCalculator::default(),
            n_thread: Self::default_threads(),
            progress: false,
        }
    }
    /// Half the available cores, at least 1
    pub fn default_threads() -> usize {
        let n_core = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        (n_core / 2).max(1)
    }
    /// Sets the raw export layout
    pub fn layout(self, layout: RawLayout) -> Self {
        Self { layout, ..self }
    }
    /// Sets the quantity calculator
    pub fn calculator(self, calculator: QuantityCalculator) -> Self {
        Self { calculator, ..self }
    }
    /// Sets the number of worker threads
    pub fn threads(self, n_thread: usize) -> Self {
        Self {
            n_thread: n_thread.max(1),
            ..self
        }
    }
    /// Displays a progress bar for the parallel phases
    pub fn progress(self, progress: bool) -> Self {
        Self { progress, ..self }
    }
    pub fn wafer_set(&self) -> &WaferSet {
        &self.set
    }
    pub fn settings(&self) -> &MapSettings {
        &self.settings
    }
    fn progress_bar(&self, n: usize) -> ProgressBar {
        if self.progress {
            ProgressBar::new(n as u64)
        } else {
            ProgressBar::hidden()
        }
    }
    fn pool(&self) -> Result<rayon::ThreadPool, Error> {
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(self.n_thread)
            .build()?)
    }
    /// Derives the slot table of every slot with a raw export
    pub fn derive(&self) -> Result<BatchReport, Error> {
        let mut exports: BTreeMap<SlotId, (Slot, Vec<PathBuf>)> = BTreeMap::new();
        for (slot, path) in self.set.raw_files() {
            exports
                .entry(slot.id)
                .or_insert_with(|| (slot, vec![]))
                .1
                .push(path);
        }
        let tasks: Vec<_> = exports.into_values().collect();
        log::info!("Deriving {} slot(s) of {:?}...", tasks.len(), self.set.root());
        let pb = self.progress_bar(tasks.len());
        let results: Vec<_> = self.pool()?.install(|| {
            tasks
                .par_iter()
                .progress_with(pb)
                .map(|(slot, exports)| {
                    self.derive_slot(slot, exports)
                        .map_err(|source| SlotError {
                            slot: slot.id,
                            source,
                        })
                })
                .collect()
        });
        Ok(BatchReport::from_results(results))
    }
    fn derive_slot(
        &self,
        slot: &Slot,
        exports: &[PathBuf],
    ) -> std::result::Result<SlotReport, SlotFailure> {
        slot.mapping_dir()?;
        let raw = exports.first().ok_or(SlotFailure::NoRawExport)?;
        if exports.len() > 1 {
            log::warn!(
                "slot {}: {} raw exports, using {:?}",
                slot.id,
                exports.len(),
                raw
            );
        }
        let table = SlotTable::from_raw(raw, &self.layout, &self.calculator)?;
        let data_file = slot.data_file();
        table.save(&data_file)?;
        Ok(SlotReport::new(slot.id, Phase::Derive, vec![data_file]))
    }
    /// Computes the slot statistics and the cross-slot tables
    pub fn aggregate(&self) -> Result<BatchReport, Error> {
        let mut results = vec![];
        let mut tables = BTreeMap::new();
        let mut summaries = vec![];
        for (slot, path) in self.set.data_files() {
            let result = SlotTable::load(&path)
                .map_err(SlotFailure::from)
                .and_then(|table| {
                    let stats = SlotStatistics::new(slot.id, &table);
                    let summary_file = slot.summary_file();
                    stats.save(&summary_file)?;
                    summaries.push(stats);
                    tables.insert(slot.id, table);
                    Ok(SlotReport::new(slot.id, Phase::Aggregate, vec![summary_file]))
                })
                .map_err(|source| SlotError {
                    slot: slot.id,
                    source,
                });
            results.push(result);
        }
        let stats = StatisticsAggregator::new(&self.set).run(summaries, &tables)?;
        log::info!(
            "{} statistics row(s) over {} slot(s)",
            stats.len(),
            tables.len()
        );
        Ok(BatchReport::from_results(results))
    }
    /// Interpolates the quantities of every slot with a slot table
    pub fn map(&self, options: MapOptions) -> Result<BatchReport, Error> {
        let aggregate_dir = self.set.aggregate_path();
        let resolver = Arc::new(ScaleResolver::new(
            options.scale.policy(),
            &self.settings,
            &aggregate_dir,
        ));
        let stats = if options.stats {
            load_stats(&aggregate_dir.join(STATS_FILE)).map(Arc::new)
        } else {
            None
        };
        let tasks: Vec<_> = self
            .set
            .data_files()
            .map(|(slot, _)| SlotTask {
                slot,
                settings: Arc::clone(&self.settings),
                resolver: Arc::clone(&resolver),
                stats: stats.clone(),
                options,
            })
            .collect();
        log::info!("Mapping {} slot(s) of {:?}...", tasks.len(), self.set.root());
        let pb = self.progress_bar(tasks.len());
        let results: Vec<_> = self.pool()?.install(|| {
            tasks
                .par_iter()
                .progress_with(pb)
                .map(|task| {
                    task.run().map_err(|source| SlotError {
                        slot: task.slot.id,
                        source,
                    })
                })
                .collect()
        });
        Ok(BatchReport::from_results(results))
    }
    /// Runs the 3 phases
    pub fn run(&self, options: MapOptions) -> Result<BatchReport, Error> {
        let mut report = self.derive()?;
        report.merge(self.aggregate()?);
        report.merge(self.map(options)?);
        Ok(report)
    }
    /// Resolves the color scale bounds of each quantity
    pub fn bounds(
        &self,
        mode: ScaleMode,
    ) -> Vec<(Parameter, std::result::Result<ScaleBounds, ScaleError>)> {
        let resolver =
            ScaleResolver::new(mode.policy(), &self.settings, self.set.aggregate_path());
        Parameter::iter()
            .map(|parameter| (parameter, resolver.resolve(parameter)))
            .collect()
    }
}

fn load_stats(path: &Path) -> Option<CrossSlotStatistics> {
    match CrossSlotStatistics::read(path) {
        Ok(stats) => Some(stats),
        Err(e) => {
            log::warn!("maps without statistics: {}", e);
            None
        }
    }
}
