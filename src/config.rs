use crate::aggregate::DEFAULT_MAX_OBJECTS;
use crate::detectors::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::labels::LabelTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV: &str = "ROOMSENSE_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CliConfig {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub labels: LabelsConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionConfig {
    pub confidence_threshold: f64,
    pub max_objects: usize,
    pub model: PathBuf,
    pub boxes: bool,
    pub layout: bool,
}

/// Overrides the built-in label table when `needs` is non-empty.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct LabelsConfig {
    /// Detector label -> need.
    pub needs: BTreeMap<String, String>,
    /// Extra relevant labels; defaults to the keys of `needs`.
    pub relevant: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub pretty: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            max_objects: DEFAULT_MAX_OBJECTS,
            model: PathBuf::from("yolov8n.onnx"),
            boxes: false,
            layout: false,
        }
    }
}

impl LabelsConfig {
    pub fn to_table(&self) -> LabelTable {
        if self.needs.is_empty() {
            return LabelTable::default();
        }
        let relevant = self
            .needs
            .keys()
            .chain(self.relevant.iter())
            .map(String::as_str);
        LabelTable::new(relevant, self.needs.clone())
    }
}

impl CliConfig {
    /// Load from `explicit`, then `$ROOMSENSE_CONFIG`, then the user config
    /// directory. Only the user config directory may be missing.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os(CONFIG_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        if let Some(path) = explicit.map(Path::to_path_buf).or(env_path) {
            return Self::load_from(&path);
        }

        match Self::config_file_path() {
            Some(path) if path.is_file() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn label_table(&self) -> LabelTable {
        self.labels.to_table()
    }

    pub fn config_file_path() -> Option<PathBuf> {
        Self::config_dir().map(|mut path| {
            path.push("config.toml");
            path
        })
    }

    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push("roomsense");
            path
        })
    }
}
