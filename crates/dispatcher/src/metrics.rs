//! Queue and worker counters for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters kept by a `MetricsQueue`
#[derive(Debug, Default)]
pub struct QueueMetrics {
    enqueued_count: AtomicU64,
    deduplicated_count: AtomicU64,
    dropped_count: AtomicU64,
}

impl QueueMetrics {
    pub fn enqueued_count(&self) -> u64 {
        self.enqueued_count.load(Ordering::Relaxed)
    }

    pub(crate) fn inc_enqueued(&self) {
        self.enqueued_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Enqueues rejected by the "log once" rule
    pub fn deduplicated_count(&self) -> u64 {
        self.deduplicated_count.load(Ordering::Relaxed)
    }

    pub(crate) fn inc_deduplicated(&self) {
        self.deduplicated_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Enqueues lost to an internal queue fault
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub(crate) fn inc_dropped(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }
}

/// Metrics for a single dispatch worker
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    /// Batches handed to the sink successfully
    batch_count: AtomicU64,
    /// Metrics inside those batches
    delivered_count: AtomicU64,
    /// Failed delivery attempts
    failure_count: AtomicU64,
    /// Metrics inside failed batches (never retried)
    lost_count: AtomicU64,
}

impl WorkerMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_count(&self) -> u64 {
        self.batch_count.load(Ordering::Relaxed)
    }

    pub fn delivered_count(&self) -> u64 {
        self.delivered_count.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn lost_count(&self) -> u64 {
        self.lost_count.load(Ordering::Relaxed)
    }

    /// Record a successful delivery of `len` metrics
    pub fn record_success(&self, len: usize) {
        self.batch_count.fetch_add(1, Ordering::Relaxed);
        self.delivered_count.fetch_add(len as u64, Ordering::Relaxed);
    }

    /// Record a failed delivery of `len` metrics
    pub fn record_failure(&self, len: usize) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        self.lost_count.fetch_add(len as u64, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batch_count: self.batch_count(),
            delivered_count: self.delivered_count(),
            failure_count: self.failure_count(),
            lost_count: self.lost_count(),
        }
    }
}

/// Snapshot of worker metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub batch_count: u64,
    pub delivered_count: u64,
    pub failure_count: u64,
    pub lost_count: u64,
}

impl std::ops::Add for MetricsSnapshot {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            batch_count: self.batch_count + rhs.batch_count,
            delivered_count: self.delivered_count + rhs.delivered_count,
            failure_count: self.failure_count + rhs.failure_count,
            lost_count: self.lost_count + rhs.lost_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_metrics_snapshot() {
        let metrics = WorkerMetrics::new();
        metrics.record_success(10);
        metrics.record_success(3);
        metrics.record_failure(7);

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                batch_count: 2,
                delivered_count: 13,
                failure_count: 1,
                lost_count: 7,
            }
        );
    }

    #[test]
    fn test_snapshot_sum() {
        let a = MetricsSnapshot {
            batch_count: 1,
            delivered_count: 10,
            ..Default::default()
        };
        let b = MetricsSnapshot {
            failure_count: 2,
            lost_count: 5,
            ..Default::default()
        };
        let total = a + b;
        assert_eq!(total.batch_count, 1);
        assert_eq!(total.lost_count, 5);
    }
}
