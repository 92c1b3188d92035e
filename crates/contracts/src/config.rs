//! PipelineConfig - Config Loader output
//!
//! Describes one relay: dispatch pacing, the delivery sink, and what is known
//! about the remote server.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use validator::Validate;

/// Default number of dispatch workers
pub const DEFAULT_NUM_WORKERS: usize = 1;
/// Default pause between two drains of the same worker
pub const DEFAULT_DISPATCH_INTERVAL_MS: u64 = 5_000;
/// Default maximum batch size; the collection endpoint rejects larger batches
pub const DISPATCH_BATCH_SIZE: usize = 10;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete relay configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PipelineConfig {
    #[serde(default)]
    pub version: ConfigVersion,

    /// Worker pacing
    #[serde(default)]
    #[validate(nested)]
    pub dispatch: DispatchConfig,

    /// Delivery target
    #[serde(default)]
    #[validate(nested)]
    pub sink: SinkConfig,

    /// Remote server description
    #[serde(default)]
    pub server: ServerConfig,
}

/// Dispatch worker settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DispatchConfig {
    /// Number of workers started by the dispatcher
    #[serde(default = "default_num_workers")]
    #[validate(range(min = 1, max = 64))]
    pub num_workers: usize,

    /// Milliseconds between drains
    #[serde(default = "default_interval_ms")]
    #[validate(range(min = 1))]
    pub interval_ms: u64,

    /// Metrics per batch (0 = whole queue)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl DispatchConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            num_workers: default_num_workers(),
            interval_ms: default_interval_ms(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_num_workers() -> usize {
    DEFAULT_NUM_WORKERS
}

fn default_interval_ms() -> u64 {
    DEFAULT_DISPATCH_INTERVAL_MS
}

fn default_batch_size() -> usize {
    DISPATCH_BATCH_SIZE
}

/// Sink configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink name
    #[validate(length(min = 1))]
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            name: "log".to_string(),
            sink_type: SinkType::Log,
            params: HashMap::new(),
        }
    }
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log through tracing
    Log,
    /// Append JSON lines to a file
    File,
    /// POST to the remote collection endpoint
    Http,
}

/// Remote server description
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Site URL, e.g. `https://example.site.com`
    #[serde(default)]
    pub base_url: Option<String>,

    /// Reported server version, `major.minor.patch`
    #[serde(default)]
    pub version: Option<String>,
}
