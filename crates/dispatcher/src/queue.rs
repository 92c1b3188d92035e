//! MetricsQueue - shared FIFO between producers and dispatch workers

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use contracts::Metric;
use tracing::{trace, warn};

use crate::metrics::QueueMetrics;

static GLOBAL_QUEUE: OnceLock<Arc<MetricsQueue>> = OnceLock::new();

/// Result of an `enqueue` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Appended to the tail of the queue
    Queued,
    /// Rejected by the "log once" rule
    Deduplicated,
    /// Lost to an internal queue fault
    Dropped,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Metric>,
    /// Identities enqueued so far; never pruned.
    seen: HashSet<String>,
}

/// Thread-safe FIFO with "log once" deduplication
///
/// The queue is meant to exist once per process: either build one with
/// [`MetricsQueue::new`] in the composition root and share the `Arc`, or use
/// [`MetricsQueue::global`].
#[derive(Debug, Default)]
pub struct MetricsQueue {
    state: Mutex<QueueState>,
    metrics: QueueMetrics,
}

impl MetricsQueue {
    /// Create an empty, unshared queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide queue, created on first access
    pub fn global() -> Arc<MetricsQueue> {
        Arc::clone(GLOBAL_QUEUE.get_or_init(|| Arc::new(MetricsQueue::new())))
    }

    /// Append `metric` to the tail of the queue
    ///
    /// With `dedupe`, a metric whose identity was already enqueued (by any
    /// earlier call, deduplicated or not) is dropped. Every accepted metric
    /// marks its identity as seen.
    pub fn enqueue(&self, metric: Metric, dedupe: bool) -> EnqueueOutcome {
        let Some(mut state) = self.lock() else {
            self.metrics.inc_dropped();
            return EnqueueOutcome::Dropped;
        };

        if dedupe && state.seen.contains(metric.identity()) {
            drop(state);
            self.metrics.inc_deduplicated();
            observability::record_deduplicated();
            trace!(identity = %metric.identity(), "Metric already logged, skipped");
            return EnqueueOutcome::Deduplicated;
        }

        if !state.seen.contains(metric.identity()) {
            state.seen.insert(metric.identity().to_string());
        }
        state.pending.push_back(metric);
        let depth = state.pending.len();
        drop(state);

        self.metrics.inc_enqueued();
        observability::record_enqueued(dedupe);
        observability::record_queue_depth(depth);
        EnqueueOutcome::Queued
    }

    /// Remove up to `max_count` metrics from the head of the queue
    ///
    /// `None` or `Some(0)` drains everything. Never fails: an internal fault
    /// yields an empty batch.
    pub fn drain(&self, max_count: Option<usize>) -> Vec<Metric> {
        let Some(mut state) = self.lock() else {
            return Vec::new();
        };

        let available = state.pending.len();
        let count = match max_count {
            Some(n) if n > 0 => n.min(available),
            _ => available,
        };
        let batch: Vec<Metric> = state.pending.drain(..count).collect();
        let depth = state.pending.len();
        drop(state);

        if !batch.is_empty() {
            observability::record_queue_depth(depth);
        }
        batch
    }

    /// Number of pending metrics
    pub fn len(&self) -> usize {
        self.lock().map_or(0, |state| state.pending.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `identity` has ever been enqueued
    pub fn has_seen(&self, identity: &str) -> bool {
        self.lock().is_some_and(|state| state.seen.contains(identity))
    }

    /// Queue counters
    pub fn metrics(&self) -> &QueueMetrics {
        &self.metrics
    }

    /// A poisoned lock means a thread panicked mid-mutation; the queue stops
    /// accepting and yielding metrics rather than trusting partial state.
    fn lock(&self) -> Option<MutexGuard<'_, QueueState>> {
        match self.state.lock() {
            Ok(guard) => Some(guard),
            Err(_) => {
                warn!("Metrics queue lock poisoned, treating queue as unavailable");
                None
            }
        }
    }
}
