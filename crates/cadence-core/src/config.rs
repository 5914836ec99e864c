//! Engine configuration
//!
//! Loaded from a JSON file; every field has a default so an empty object
//! (`{}`) is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// Recurring task scheduler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Period of the background sweep
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl SchedulerConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Who may complete a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Only the assignee may complete an assigned task
    #[serde(default)]
    pub enforce_assignee: bool,

    /// With `enforce_assignee`, anybody may complete an unassigned task
    #[serde(default = "default_allow_unassigned")]
    pub allow_unassigned: bool,
}

fn default_allow_unassigned() -> bool {
    true
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            enforce_assignee: false,
            allow_unassigned: default_allow_unassigned(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Snapshot file used by the CLI `run` command
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
