//! Producer API - what application code calls to log events

use serde_json::Value;

use contracts::{ContractError, EventMetric};

use crate::queue::{EnqueueOutcome, MetricsQueue};

/// Build an event metric and enqueue it
///
/// With `dedupe`, the event is dropped if an event with the same group and
/// name was enqueued before in this queue's lifetime.
///
/// # Errors
/// Returns `InvalidMetric` for a blank group/name or non-object properties.
/// Nothing past the queue is reported back.
///
/// # Example
///
/// ```
/// use dispatcher::{enqueue_event, EnqueueOutcome, MetricsQueue};
/// use serde_json::json;
///
/// let queue = MetricsQueue::new();
/// let outcome = enqueue_event(&queue, "App", "Logged In", json!({ "Version": "1.0" }), true)?;
/// assert_eq!(outcome, EnqueueOutcome::Queued);
/// # Ok::<(), contracts::ContractError>(())
/// ```
pub fn enqueue_event(
    queue: &MetricsQueue,
    group: &str,
    name: &str,
    properties: Value,
    dedupe: bool,
) -> Result<EnqueueOutcome, ContractError> {
    let event = EventMetric::new(group, name)?.with_properties(properties)?;
    Ok(log_event_metric(queue, event, dedupe))
}

/// Enqueue an already-built event
pub fn log_event_metric(queue: &MetricsQueue, event: EventMetric, dedupe: bool) -> EnqueueOutcome {
    queue.enqueue(event.into_metric(), dedupe)
}
