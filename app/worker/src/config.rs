//! Worker configuration loaded from TOML.

use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// Top-level worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Gateway task endpoint to pull from (supports `${ENV_VAR}` expansion).
    pub task_endpoint: String,
    /// Gateway result endpoint to push to.
    pub result_endpoint: String,
    /// Upper bound on a single wait for the next task, in milliseconds.
    pub poll_interval_ms: u64,
    /// Delay before retrying a failed push or pull, in milliseconds.
    pub retry_backoff_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            task_endpoint: "127.0.0.1:5555".to_owned(),
            result_endpoint: "127.0.0.1:5556".to_owned(),
            poll_interval_ms: 100,
            retry_backoff_ms: 1000,
        }
    }
}

impl WorkerConfig {
    /// Parse a TOML string, expanding `${VAR}` references first.
    pub fn from_toml(toml_str: &str) -> anyhow::Result<Self> {
        let expanded = crate::utils::expand_env_vars(toml_str);
        let config: Self = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Load configuration from a file path. A missing file yields defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
