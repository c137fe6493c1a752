//! User settings
//!
//! The settings are a flat JSON object mapping the labels of the input fields to their
//! text, shared with the desktop front-end in `$HOME/WDXRF/settings_data.json`.

use crate::{scale::ScaleBounds, Parameter};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};
use strum::IntoEnumIterator;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read or write settings file {0:?}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("invalid settings file")]
    Json(#[from] serde_json::Error),
    #[error("missing or invalid setting: {0:?}")]
    Missing(String),
    #[error("HOME is not set")]
    Home(#[from] std::env::VarError),
}
type Result<T> = std::result::Result<T, SettingsError>;

pub const WAFER_SIZE: &str = "Wafer size (cm):";
pub const EDGE_EXCLUSION: &str = "Edge Exclusion (cm):";
pub const STEP: &str = "Step (cm):";
pub const COLUMNS: &str = "Columns on GUI:";

const DEFAULTS: [(&str, &str); 10] = [
    (WAFER_SIZE, "20"),
    (EDGE_EXCLUSION, "2.5"),
    (STEP, "0.5"),
    (COLUMNS, "3"),
    ("Min density (ug.cm-2):", "0"),
    ("Max density (ug.cm-2):", ""),
    ("Min S/Mo:", "0"),
    ("Max S/Mo:", "3"),
    ("Min thickness (ML):", "0"),
    ("Max thickness (ML):", ""),
];

/// The settings file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsStore {
    entries: BTreeMap<String, Value>,
}
impl Default for SettingsStore {
    fn default() -> Self {
        Self {
            entries: DEFAULTS
                .iter()
                .map(|(label, text)| (label.to_string(), Value::String(text.to_string())))
                .collect(),
        }
    }
}
impl SettingsStore {
    /// Path to the settings file in the home directory
    pub fn default_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")?;
        Ok(Path::new(&home).join("WDXRF").join("settings_data.json"))
    }
    /// Loads a settings file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading {:?}...", path);
        let contents =
            fs::read_to_string(path).map_err(|e| SettingsError::Io(path.to_path_buf(), e))?;
        Ok(serde_json::from_str(&contents)?)
    }
    /// Loads a settings file, falling back to the default settings if there is none
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("{:?} not found, using default settings", path);
            Ok(Self::default())
        }
    }
    /// Saves the settings, creating the parent folder if needed
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let io_err = |e| SettingsError::Io(path.to_path_buf(), e);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?).map_err(io_err)?;
        log::info!("{:?} saved", path);
        Ok(())
    }
    /// Text of an entry
    pub fn get(&self, label: &str) -> Option<String> {
        self.entries.get(label).map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
    }
    pub fn set<S: Into<String>>(&mut self, label: &str, text: S) {
        self.entries
            .insert(label.to_string(), Value::String(text.into()));
    }
    /// Numerical values of the entries, `None` if empty or not a number
    pub fn values(&self) -> HashMap<String, Option<f64>> {
        self.entries
            .iter()
            .map(|(label, value)| {
                let number = match value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(text) => text.trim().parse::<f64>().ok(),
                    _ => None,
                };
                (label.clone(), number.filter(|v| v.is_finite()))
            })
            .collect()
    }
    /// Typed settings for the mapping
    pub fn map_settings(&self) -> Result<MapSettings> {
        MapSettings::from_values(&self.values())
    }
}

/// Snapshot of the settings used by a batch
#[derive(Debug, Clone, PartialEq)]
pub struct MapSettings {
    /// wafer diameter [cm]
    pub wafer_size: f64,
    /// width of the excluded ring at the wafer edge [cm]
    pub edge_exclusion: f64,
    /// grid step [cm]
    pub step: f64,
    /// user bounds of each quantity
    pub bounds: HashMap<Parameter, ScaleBounds>,
}
impl MapSettings {
    /// Builds the settings from the numerical values of the settings file
    pub fn from_values(values: &HashMap<String, Option<f64>>) -> Result<Self> {
        let get = |label: &str| values.get(label).copied().flatten();
        let wafer_size = get(WAFER_SIZE)
            .filter(|&size| size > 0.)
            .ok_or_else(|| SettingsError::Missing(WAFER_SIZE.to_string()))?;
        let bounds = Parameter::iter()
            .map(|parameter| {
                let (min, max) = parameter.bound_keys();
                (
                    parameter,
                    ScaleBounds {
                        min: get(min),
                        max: get(max),
                    },
                )
            })
            .collect();
        Ok(Self {
            wafer_size,
            edge_exclusion: get(EDGE_EXCLUSION).unwrap_or(0.),
            step: get(STEP).unwrap_or(0.5),
            bounds,
        })
    }
    /// Wafer radius [cm]
    pub fn radius(&self) -> f64 {
        0.5 * self.wafer_size
    }
    /// User bounds of a quantity
    pub fn manual_bounds(&self, parameter: Parameter) -> ScaleBounds {
        self.bounds.get(&parameter).copied().unwrap_or_default()
    }
    /// Minimum density below which the density map is masked
    pub fn density_threshold(&self) -> Option<f64> {
        self.manual_bounds(Parameter::Density).min
    }
}
impl Default for MapSettings {
    fn default() -> Self {
        SettingsStore::default()
            .map_settings()
            .unwrap_or_else(|_| Self {
                wafer_size: 20.,
                edge_exclusion: 2.5,
                step: 0.5,
                bounds: HashMap::new(),
            })
    }
}
