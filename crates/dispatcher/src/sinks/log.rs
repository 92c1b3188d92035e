//! LogSink - logs batch summaries via tracing

use contracts::{ContractError, Metric, MetricSink};
use tracing::{debug, info, instrument};

/// Sink that logs every delivered batch
///
/// Used as the local "metrics logged" hook and for dry runs without a
/// collection endpoint.
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_batch(&self, batch: &[Metric]) {
        let identities: Vec<&str> = batch.iter().map(Metric::identity).collect();
        info!(
            sink = %self.name,
            count = batch.len(),
            metrics = ?identities,
            "Metrics batch dispatched"
        );

        for metric in batch {
            debug!(sink = %self.name, identity = %metric.identity(), payload = %metric.payload(), "Metric");
        }
    }
}

impl MetricSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_deliver",
        skip(self, batch),
        fields(sink = %self.name, batch = batch.len())
    )]
    async fn deliver(&self, batch: &[Metric]) -> Result<(), ContractError> {
        self.log_batch(batch);
        Ok(())
    }
}
