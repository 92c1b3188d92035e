//! Sink implementations
//!
//! Contains LogSink, FileSink, and HttpSink, plus `ConfiguredSink` which
//! picks one of them from a `SinkConfig`.

mod file;
mod http;
mod log;

pub use self::file::{FileSink, FileSinkConfig};
pub use self::http::{build_payload, HttpSink, HttpSinkConfig, API_ENDPOINT};
pub use self::log::LogSink;

use std::sync::Arc;

use contracts::{ContractError, Metric, MetricSink, SessionAuth, SinkConfig, SinkType};
use tracing::instrument;

use crate::error::DispatcherError;

/// Sink selected at runtime from configuration
pub enum ConfiguredSink {
    Log(LogSink),
    File(FileSink),
    Http(HttpSink),
}

impl ConfiguredSink {
    /// Create a sink from configuration
    ///
    /// `base_url` is only consulted by `http` sinks.
    #[instrument(
        name = "dispatcher_create_sink",
        skip(config, session),
        fields(sink = %config.name, sink_type = ?config.sink_type)
    )]
    pub fn from_config(
        config: &SinkConfig,
        base_url: Option<&str>,
        session: Arc<dyn SessionAuth>,
    ) -> Result<Self, DispatcherError> {
        match config.sink_type {
            SinkType::Log => Ok(Self::Log(LogSink::new(&config.name))),
            SinkType::File => FileSink::from_params(&config.name, &config.params)
                .map(Self::File)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string())),
            SinkType::Http => {
                let base_url = base_url.ok_or_else(|| {
                    DispatcherError::sink_creation(&config.name, "server.base_url is not set")
                })?;
                HttpSink::from_params(&config.name, base_url, &config.params, session)
                    .map(Self::Http)
                    .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))
            }
        }
    }
}

impl MetricSink for ConfiguredSink {
    fn name(&self) -> &str {
        match self {
            Self::Log(sink) => sink.name(),
            Self::File(sink) => sink.name(),
            Self::Http(sink) => sink.name(),
        }
    }

    async fn deliver(&self, batch: &[Metric]) -> Result<(), ContractError> {
        match self {
            Self::Log(sink) => sink.deliver(batch).await,
            Self::File(sink) => sink.deliver(batch).await,
            Self::Http(sink) => sink.deliver(batch).await,
        }
    }
}
