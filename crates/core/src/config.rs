//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into the [`Hospital`](crate::Hospital). The core never reads environment variables
//! itself; the binary reads them and hands the raw values to [`CoreConfig::from_env_values`].

use crate::constants::DEFAULT_DATA_DIR;
use crate::error::{ConfigError, ConfigResult};
use crate::snapshot::SnapshotFormat;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoreConfig {
    data_dir: PathBuf,
    snapshot_format: SnapshotFormat,
    autosave: bool,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(
        data_dir: PathBuf,
        snapshot_format: SnapshotFormat,
        autosave: bool,
    ) -> ConfigResult<Self> {
        if data_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidInput("data_dir cannot be empty".into()));
        }

        Ok(Self {
            data_dir,
            snapshot_format,
            autosave,
        })
    }

    /// Build a configuration from optional raw values, as read from the environment.
    ///
    /// Absent or blank values fall back to the defaults: `hospital_data`, JSON snapshots and
    /// auto-persistence on.
    pub fn from_env_values(
        data_dir: Option<String>,
        snapshot_format: Option<String>,
        autosave: Option<String>,
    ) -> ConfigResult<Self> {
        let data_dir = non_blank(data_dir)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let snapshot_format = non_blank(snapshot_format)
            .map(|v| v.parse::<SnapshotFormat>())
            .transpose()?
            .unwrap_or_default();
        let autosave = non_blank(autosave)
            .map(|v| parse_bool("autosave", &v))
            .transpose()?
            .unwrap_or(true);

        Self::new(data_dir, snapshot_format, autosave)
    }

    /// Same configuration with a different data directory.
    pub fn with_data_dir(self, data_dir: PathBuf) -> ConfigResult<Self> {
        Self::new(data_dir, self.snapshot_format, self.autosave)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn snapshot_format(&self) -> SnapshotFormat {
        self.snapshot_format
    }

    pub fn autosave(&self) -> bool {
        self.autosave
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            snapshot_format: SnapshotFormat::default(),
            autosave: true,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(name: &str, value: &str) -> ConfigResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidInput(format!(
            "{name} must be a boolean (true/false, 1/0, yes/no, on/off), got '{other}'"
        ))),
    }
}
