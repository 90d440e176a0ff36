use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::AuthEventType;

/// Errors raised while loading, saving or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

/// Configuration for a log-sentinel run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Line parser configuration
    pub parser: ParserConfig,
    /// Brute-force detection configuration
    pub detection: DetectionConfig,
    /// Report output configuration
    pub output: OutputConfig,
}

/// Line parser configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Year assumed for syslog timestamps; the current local year when unset
    pub reference_year: Option<i32>,
}

/// Brute-force detection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Matching events within the window needed to raise an alert
    pub threshold: usize,
    /// Sliding window size in minutes
    pub window_minutes: i64,
    /// Event types counted towards the threshold
    pub event_types: Vec<AuthEventType>,
}

/// Report output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving report.json and report.md
    pub directory: PathBuf,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            threshold: 10,
            window_minutes: 10,
            event_types: vec![AuthEventType::FailedPassword],
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            directory: PathBuf::from("output"),
        }
    }
}

impl DetectionConfig {
    /// Reject settings that would make every window trigger or none at all
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "detection.threshold".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.window_minutes <= 0 {
            return Err(ConfigError::Invalid {
                field: "detection.window_minutes".to_string(),
                reason: format!("must be positive, got {}", self.window_minutes),
            });
        }
        if self.event_types.is_empty() {
            return Err(ConfigError::Invalid {
                field: "detection.event_types".to_string(),
                reason: "at least one event type is required".to_string(),
            });
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detection.validate()
    }
}
