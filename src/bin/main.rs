use anyhow::Context;
use itertools::Itertools;
use std::path::PathBuf;
use structopt::StructOpt;
use strum::IntoEnumIterator;
use wdxrf_maps::{
    MapOptions, MapSettings, ScaleMode, SettingsStore, WaferBatchProcessor, WaferSet,
};

#[derive(Debug, StructOpt)]
#[structopt(name = "wdxrf-maps", about = "WDXRF wafer mapping")]
struct Opt {
    /// Path to the wafer set folder
    #[structopt(parse(from_os_str))]
    wafer_set: PathBuf,
    /// Settings file [default: $HOME/WDXRF/settings_data.json]
    #[structopt(long, parse(from_os_str))]
    settings: Option<PathBuf>,
    /// Number of worker threads [default: half the CPU cores]
    #[structopt(short, long)]
    threads: Option<usize>,
    /// Display progress bars
    #[structopt(short, long)]
    progress: bool,
    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, StructOpt)]
struct MapOpt {
    /// Color scale: "Autoscale", "Identical scale" or "Identical scale auto"
    #[structopt(short, long, default_value = "Autoscale")]
    scale: ScaleMode,
    /// Annotate the maps with the mean, 3σ and uniformity of the slot
    #[structopt(long)]
    stats: bool,
    /// Prefix the map titles with the slot number
    #[structopt(long = "slot-number")]
    slot_number: bool,
}
impl MapOpt {
    fn options(&self) -> MapOptions {
        MapOptions {
            scale: self.scale,
            stats: self.stats,
            slot_number: self.slot_number,
        }
    }
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Derives the slot tables from the raw exports and computes the statistics
    Process,
    /// Interpolates the maps of the slots
    Map(MapOpt),
    /// Processes and maps the wafer set
    Run(MapOpt),
    /// Prints the color scale bounds of each quantity
    Bounds {
        /// Color scale: "Autoscale", "Identical scale" or "Identical scale auto"
        #[structopt(short, long, default_value = "Autoscale")]
        scale: ScaleMode,
    },
    /// Removes all the derived files of the wafer set
    Clean,
}

fn settings(opt: &Opt) -> anyhow::Result<MapSettings> {
    let path = match &opt.settings {
        Some(path) => path.clone(),
        None => SettingsStore::default_path()?,
    };
    SettingsStore::load_or_default(&path)
        .and_then(|store| store.map_settings())
        .with_context(|| format!("invalid settings in {:?}", path))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let set = WaferSet::open(&opt.wafer_set)?;
    if let Command::Clean = opt.cmd {
        let removed = set.clean()?;
        println!("{} derived file(s) and folder(s) removed", removed.len());
        return Ok(());
    }

    let mut processor = WaferBatchProcessor::new(set, settings(&opt)?).progress(opt.progress);
    if let Some(n_thread) = opt.threads {
        processor = processor.threads(n_thread);
    }

    let report = match &opt.cmd {
        Command::Process => {
            let mut report = processor.derive()?;
            report.merge(processor.aggregate()?);
            report
        }
        Command::Map(map) => processor.map(map.options())?,
        Command::Run(map) => processor.run(map.options())?,
        Command::Bounds { scale } => {
            println!("{} (available: {})", scale, ScaleMode::iter().join(", "));
            for (parameter, bounds) in processor.bounds(*scale) {
                match bounds {
                    Ok(bounds) => println!(" - {:<18}: {}", parameter.to_string(), bounds),
                    Err(e) => println!(" - {:<18}: {}", parameter.to_string(), e),
                }
            }
            return Ok(());
        }
        Command::Clean => return Ok(()),
    };
    print!("{}", report);
    if !report.is_success() {
        log::warn!(
            "{} slot(s) failed: {:?}",
            report.failed_slots().len(),
            report.failed_slots()
        );
    }
    Ok(())
}
