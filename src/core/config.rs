//! Configuration management for nehnes-av.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Scan-related settings
    #[serde(default)]
    pub scan: ScanConfig,
    /// Detection engine settings
    #[serde(default)]
    pub detection: DetectionConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigLoad(format!("Failed to read config file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config file: {}", e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigSave(format!("Failed to create config directory: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| Error::ConfigSave(format!("Failed to write config file: {}", e)))
    }

    /// Load configuration from the default location, falling back to defaults.
    ///
    /// See [`Config::load_or_default_at`].
    pub fn load_or_default() -> (Self, Option<Error>) {
        Self::load_or_default_at(&Self::default_config_path())
    }

    /// Load and validate `path`, or fall back to defaults.
    ///
    /// A missing file is created with default values. The returned error says
    /// why defaults were used or why the file could not be written; it is
    /// handed back so it can be reported once logging is up.
    pub fn load_or_default_at(path: &Path) -> (Self, Option<Error>) {
        if path.exists() {
            return match Self::load(path).and_then(|c| c.validate().map(|_| c)) {
                Ok(config) => (config, None),
                Err(e) => (Self::default(), Some(e)),
            };
        }

        let config = Self::default();
        let err = config.save(path).err();
        (config, err)
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        Self::data_dir().join("config.json")
    }

    /// Get the application data directory.
    pub fn data_dir() -> PathBuf {
        #[cfg(windows)]
        {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData"))
                .join("NEHNES")
        }

        #[cfg(not(windows))]
        {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join("nehnes-av")
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.scan.event_buffer == 0 {
            return Err(Error::ConfigInvalid {
                field: "scan.event_buffer".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for sig in &self.detection.extra_signatures {
            if sig.name.trim().is_empty() {
                return Err(Error::ConfigInvalid {
                    field: "detection.extra_signatures".to_string(),
                    message: "Signature names must not be empty".to_string(),
                });
            }
            if !seen.insert(sig.name.as_str()) {
                return Err(Error::ConfigInvalid {
                    field: "detection.extra_signatures".to_string(),
                    message: format!("Duplicate signature name '{}'", sig.name),
                });
            }
        }

        Ok(())
    }
}

/// Scan-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Whether to follow symbolic links while walking
    pub follow_symlinks: bool,
    /// Capacity of the worker -> controller event channel
    pub event_buffer: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: true,
            event_buffer: 1024,
        }
    }
}

/// Detection engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Try to bring up the rule engine before falling back to basic matching
    pub advanced_engine: bool,
    /// Rule database directory (defaults to `<data_dir>/rules`)
    pub rules_dir: Option<PathBuf>,
    /// Extra byte-pattern signatures added to the built-in store
    pub extra_signatures: Vec<SignatureEntry>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            advanced_engine: true,
            rules_dir: None,
            extra_signatures: Vec::new(),
        }
    }
}

impl DetectionConfig {
    /// Get the effective rule database directory.
    pub fn rules_dir(&self) -> PathBuf {
        self.rules_dir
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("rules"))
    }
}

/// A configured signature, as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    /// Threat name reported on match
    pub name: String,
    /// Pattern text (interpreted according to `encoding`)
    pub pattern: String,
    /// How `pattern` is encoded
    #[serde(default)]
    pub encoding: PatternEncoding,
}

/// Encoding of a configured signature pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternEncoding {
    /// Raw UTF-8 text
    #[default]
    Text,
    /// Hex-encoded bytes (whitespace ignored)
    Hex,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
