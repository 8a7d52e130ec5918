//! User configuration
//!
//! Read from ~/.config/relmap/config.json (or the platform equivalent).
//! A missing file means defaults; a malformed one is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings for the relmap binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database file used when `--database` is not given
    pub database: PathBuf,
    /// `tracing` filter directive, e.g. "warn" or "relmap=debug"
    pub log_filter: String,
    /// Record a backup version before every restore
    pub backup_on_restore: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: PathBuf::from("relmap.db"),
            log_filter: "warn".to_string(),
            backup_on_restore: true,
        }
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not find config directory".into()))?;
        Ok(config_dir.join("relmap").join("config.json"))
    }

    /// Load from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path()?)
    }

    /// Load from a specific file, falling back to defaults if it is absent
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| Error::Config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))
    }
}
