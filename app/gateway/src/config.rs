//! Gateway configuration loaded from TOML.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// WebSocket server bind configuration.
    pub server: ServerConfig,
    /// Task and result endpoints.
    pub queue: QueueConfig,
    /// In-process workers.
    pub workers: WorkersConfig,
    /// Result dispatch settings.
    pub dispatch: DispatchConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host (supports `${ENV_VAR}` expansion).
    pub host: String,
    /// Bind port. `0` picks a free port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 5000,
        }
    }
}

/// Push/pull endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Address workers pull tasks from.
    pub task_bind: String,
    /// Address workers push results to.
    pub result_bind: String,
    /// Maximum number of queued tasks (and buffered results).
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            task_bind: "127.0.0.1:5555".to_owned(),
            result_bind: "127.0.0.1:5556".to_owned(),
            capacity: 1024,
        }
    }
}

/// In-process worker configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    /// Number of workers started inside the gateway process.
    pub embedded: usize,
}

/// Result dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// How many retired task ids to remember for duplicate detection.
    pub retired_window: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            retired_window: 1024,
        }
    }
}

impl GatewayConfig {
    /// Parse a TOML string into a `GatewayConfig`, expanding environment
    /// variables first.
    pub fn from_toml(toml_str: &str) -> anyhow::Result<Self> {
        let expanded = worker::utils::expand_env_vars(toml_str);
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

    /// The `host:port` the WebSocket server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
