//! FileSink - appends metric payloads to a JSON-lines file

use contracts::{ContractError, Metric, MetricSink};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output file, created if missing and appended to otherwise
    pub path: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let path = params
            .get("path")
            .filter(|p| !p.is_empty())
            .ok_or_else(|| "missing 'path' parameter".to_string())?;

        Ok(Self {
            path: PathBuf::from(path),
        })
    }
}

/// Sink that writes one JSON line per metric payload
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    file: Mutex<File>,
}

impl FileSink {
    /// Create a new FileSink, creating parent directories as needed
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)?;

        Ok(Self {
            name: name.into(),
            config,
            file: Mutex::new(file),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let config = FileSinkConfig::from_params(params)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        Self::new(name, config)
    }

    pub fn path(&self) -> &PathBuf {
        &self.config.path
    }

    fn write_batch(&self, batch: &[Metric]) -> std::io::Result<()> {
        let mut buffer = Vec::with_capacity(batch.len() * 128);
        for metric in batch {
            serde_json::to_writer(&mut buffer, metric.payload())
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            buffer.push(b'\n');
        }

        let file = self
            .file
            .lock()
            .map_err(|_| std::io::Error::other("file sink lock poisoned"))?;
        let mut writer = BufWriter::new(&*file);
        writer.write_all(&buffer)?;
        writer.flush()
    }
}

impl MetricSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_deliver",
        skip(self, batch),
        fields(sink = %self.name, batch = batch.len())
    )]
    async fn deliver(&self, batch: &[Metric]) -> Result<(), ContractError> {
        self.write_batch(batch).map_err(|e| {
            error!(sink = %self.name, path = %self.config.path.display(), error = %e, "Write failed");
            ContractError::sink_delivery(&self.name, e.to_string())
        })?;
        debug!(sink = %self.name, count = batch.len(), "Batch appended");
        Ok(())
    }
}
