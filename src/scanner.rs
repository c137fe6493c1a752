//! Wafer set directory layout
//!
//! Discovers the slot folders of a wafer set, their raw exports and the paths of the
//! derived artifacts.

use crate::{SlotId, AGGREGATE_DIR, DATA_FILE, FIGURES_DIR, MAPPING_DIR, MASK_FILE, SLOT_SUMMARY_FILE};
use glob::{glob, Pattern};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("wafer set {0:?} is not a readable directory")]
    DirectoryStructure(PathBuf, #[source] io::Error),
    #[error("failed to create {0:?}")]
    CreateDir(PathBuf, #[source] io::Error),
    #[error("failed to remove {0:?}")]
    Remove(PathBuf, #[source] io::Error),
    #[error("invalid file pattern")]
    Pattern(#[from] glob::PatternError),
}
type Result<T> = std::result::Result<T, ScanError>;

/// Slot summary written by earlier releases of the mapping tool
const LEGACY_SUMMARY_FILE: &str = "Parameters_stats.csv";

/// Checks if a file in a slot folder is a derived artifact
fn is_derived(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| {
            name == DATA_FILE
                || name == SLOT_SUMMARY_FILE
                || name == LEGACY_SUMMARY_FILE
                || name == MASK_FILE
                || name.ends_with("_grid_df.csv")
                || name.ends_with(".png")
        })
        .unwrap_or_default()
}

/// A slot folder
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Slot {
    pub id: SlotId,
    pub path: PathBuf,
}
impl Slot {
    /// Path to the slot table
    pub fn data_file(&self) -> PathBuf {
        self.path.join(DATA_FILE)
    }
    /// Path to the boundary mask
    pub fn mask_file(&self) -> PathBuf {
        self.path.join(MASK_FILE)
    }
    /// Path to the statistics summary
    pub fn summary_file(&self) -> PathBuf {
        self.path.join(SLOT_SUMMARY_FILE)
    }
    /// Raw exports of the slot, sorted by name
    pub fn raw_files(&self) -> Result<Vec<PathBuf>> {
        let pattern = PathBuf::from(Pattern::escape(&self.path.to_string_lossy())).join("*.csv");
        let mut files: Vec<_> = glob(&pattern.to_string_lossy())?
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    log::warn!("{}", e);
                    None
                }
            })
            .filter(|path| path.is_file() && !is_derived(path))
            .collect();
        files.sort();
        Ok(files)
    }
    /// Folder of the rendered maps, created if needed
    pub fn mapping_dir(&self) -> Result<PathBuf> {
        let path = self.path.join(MAPPING_DIR);
        fs::create_dir_all(&path).map_err(|e| ScanError::CreateDir(path.clone(), e))?;
        Ok(path)
    }
}

/// Lazy iterator over the slot folders of a wafer set
///
/// Slots are yielded in directory traversal order.
pub struct Slots {
    entries: Option<fs::ReadDir>,
}
impl Iterator for Slots {
    type Item = Slot;

    fn next(&mut self) -> Option<Self::Item> {
        let entries = self.entries.as_mut()?;
        for entry in entries.by_ref() {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    log::warn!("skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !path.is_dir() {
                continue;
            }
            let id = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.parse::<SlotId>().ok());
            match id {
                Some(id) => return Some(Slot { id, path }),
                None => log::debug!("ignoring non-slot folder {:?}", path),
            }
        }
        None
    }
}

/// A wafer set folder
#[derive(Debug, Clone)]
pub struct WaferSet {
    root: PathBuf,
}
impl WaferSet {
    /// Opens a wafer set folder
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::read_dir(&root).map_err(|e| ScanError::DirectoryStructure(root.clone(), e))?;
        Ok(Self { root })
    }
    pub fn root(&self) -> &Path {
        &self.root
    }
    /// Iterator over the slot folders
    ///
    /// Each call starts a new traversal of the wafer set folder.
    pub fn slots(&self) -> Slots {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => Some(entries),
            Err(e) => {
                log::warn!("failed to read {:?}: {}", self.root, e);
                None
            }
        };
        Slots { entries }
    }
    /// Iterator over the slot folders sorted by slot number
    pub fn sorted_slots(&self) -> Vec<Slot> {
        let mut slots: Vec<_> = self.slots().collect();
        slots.sort();
        slots
    }
    /// Returns a slot folder from its number
    pub fn slot(&self, id: SlotId) -> Option<Slot> {
        self.slots().find(|slot| slot.id == id)
    }
    /// Iterator over the `(slot, raw export)` pairs
    ///
    /// Slots without raw export are skipped.
    pub fn raw_files(&self) -> impl Iterator<Item = (Slot, PathBuf)> + '_ {
        self.slots().flat_map(|slot| {
            let files = slot.raw_files().unwrap_or_else(|e| {
                log::warn!("slot {}: {}", slot.id, e);
                Vec::new()
            });
            if files.is_empty() {
                log::warn!("slot {}: no raw export found in {:?}", slot.id, slot.path);
            }
            files.into_iter().map(move |file| (slot.clone(), file))
        })
    }
    /// Iterator over the `(slot, slot table)` pairs
    pub fn data_files(&self) -> impl Iterator<Item = (Slot, PathBuf)> + '_ {
        self.slots().filter_map(|slot| {
            let path = slot.data_file();
            path.is_file().then_some((slot, path))
        })
    }
    /// Folder of the cross-slot tables, created if needed
    pub fn aggregate_dir(&self) -> Result<PathBuf> {
        let path = self.root.join(AGGREGATE_DIR);
        fs::create_dir_all(&path).map_err(|e| ScanError::CreateDir(path.clone(), e))?;
        Ok(path)
    }
    /// Path to the cross-slot tables folder, without creating it
    pub fn aggregate_path(&self) -> PathBuf {
        self.root.join(AGGREGATE_DIR)
    }
    /// Removes all the derived artifacts, leaving the raw exports untouched
    ///
    /// Returns the removed paths.
    pub fn clean(&self) -> Result<Vec<PathBuf>> {
        let mut removed = vec![];
        let remove_dir = |path: PathBuf, removed: &mut Vec<PathBuf>| -> Result<()> {
            if path.is_dir() {
                fs::remove_dir_all(&path).map_err(|e| ScanError::Remove(path.clone(), e))?;
                log::info!("Delete: {:?}", path);
                removed.push(path);
            }
            Ok(())
        };
        for name in [FIGURES_DIR, MAPPING_DIR, AGGREGATE_DIR] {
            remove_dir(self.root.join(name), &mut removed)?;
        }
        for slot in self.slots() {
            for name in [FIGURES_DIR, MAPPING_DIR, AGGREGATE_DIR] {
                remove_dir(slot.path.join(name), &mut removed)?;
            }
            let entries =
                fs::read_dir(&slot.path).map_err(|e| ScanError::Remove(slot.path.clone(), e))?;
            for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
                if path.is_file() && is_derived(&path) {
                    fs::remove_file(&path).map_err(|e| ScanError::Remove(path.clone(), e))?;
                    log::info!("Delete: {:?}", path);
                    removed.push(path);
                }
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn wafer_set(name: &str) -> std::result::Result<PathBuf, Box<dyn Error>> {
        let root = std::env::temp_dir().join(format!("wdxrf-scan-{}-{}", name, std::process::id()));
        if root.exists() {
            fs::remove_dir_all(&root)?;
        }
        for dir in ["1", "2", "10", "notes"] {
            fs::create_dir_all(root.join(dir))?;
        }
        fs::write(root.join("1").join("export.csv"), "raw")?;
        fs::write(root.join("1").join(DATA_FILE), "X,Y")?;
        fs::write(root.join("1").join("Density_grid_df.csv"), "Y")?;
        fs::write(root.join("10").join("export.csv"), "raw")?;
        fs::write(root.join("notes").join("export.csv"), "raw")?;
        Ok(root)
    }

    #[test]
    fn discover_slots() -> std::result::Result<(), Box<dyn Error>> {
        let root = wafer_set("discover")?;
        let set = WaferSet::open(&root)?;
        let ids: Vec<_> = set.sorted_slots().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 10]);
        // restartable
        assert_eq!(set.slots().count(), set.slots().count());
        let mut raw: Vec<_> = set
            .raw_files()
            .map(|(slot, path)| (slot.id, path.file_name().unwrap().to_owned()))
            .collect();
        raw.sort();
        assert_eq!(raw, vec![(1, "export.csv".into()), (10, "export.csv".into())]);
        let data: Vec<_> = set.data_files().map(|(slot, _)| slot.id).collect();
        assert_eq!(data, vec![1]);
        fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[test]
    fn raw_files_in_bracketed_folder() -> std::result::Result<(), Box<dyn Error>> {
        let root = wafer_set("[run*1]")?;
        fs::write(root.join("1").join(LEGACY_SUMMARY_FILE), "Parameter")?;
        let set = WaferSet::open(&root)?;
        let files = set.slot(1).unwrap().raw_files()?;
        assert_eq!(files, vec![root.join("1").join("export.csv")]);
        fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[test]
    fn create_on_demand() -> std::result::Result<(), Box<dyn Error>> {
        let root = wafer_set("create")?;
        let set = WaferSet::open(&root)?;
        let slot = set.slot(2).unwrap();
        assert!(!slot.path.join(MAPPING_DIR).exists());
        assert!(slot.mapping_dir()?.is_dir());
        assert!(set.aggregate_dir()?.is_dir());
        fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[test]
    fn clean_keeps_raw_exports() -> std::result::Result<(), Box<dyn Error>> {
        let root = wafer_set("clean")?;
        let set = WaferSet::open(&root)?;
        set.aggregate_dir()?;
        set.slot(1).unwrap().mapping_dir()?;
        let removed = set.clean()?;
        assert_eq!(removed.len(), 4);
        assert!(root.join("1").join("export.csv").exists());
        assert!(!root.join("1").join(DATA_FILE).exists());
        assert!(!root.join(AGGREGATE_DIR).exists());
        fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[test]
    fn missing_root() {
        assert!(matches!(
            WaferSet::open("/no/such/wafer/set"),
            Err(ScanError::DirectoryStructure(..))
        ));
    }
}
