//! MetricSink trait - worker delivery interface
//!
//! Defines the abstract interface for the remote collection endpoint.

use crate::{ContractError, Metric};

/// Batch delivery trait
///
/// One sink is shared by every worker of a dispatcher, so delivery takes
/// `&self`. Failures are reported, never retried by the caller.
#[trait_variant::make(MetricSink: Send)]
pub trait LocalMetricSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver one batch of metrics
    ///
    /// # Errors
    /// Returns delivery error (should include context)
    async fn deliver(&self, batch: &[Metric]) -> Result<(), ContractError>;
}
