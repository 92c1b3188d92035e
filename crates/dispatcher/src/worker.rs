//! DispatchWorker - background task draining the queue into a sink

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use contracts::{
    CapabilityProbe, MetricSink, DEFAULT_DISPATCH_INTERVAL_MS, DISPATCH_BATCH_SIZE,
};

use crate::metrics::WorkerMetrics;
use crate::queue::MetricsQueue;

/// Pacing of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Pause between two drains
    pub interval: Duration,
    /// Maximum metrics per batch (0 = whole queue)
    pub batch_size: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_DISPATCH_INTERVAL_MS),
            batch_size: DISPATCH_BATCH_SIZE,
        }
    }
}

/// Lifecycle of a worker. `Halted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    Running,
    Halted,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Running,
            _ => Self::Halted,
        }
    }
}

#[derive(Debug, Default)]
struct SharedState(AtomicU8);

impl SharedState {
    fn get(&self) -> WorkerState {
        WorkerState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: WorkerState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Handle to one dispatch worker
///
/// The worker task is detached: nothing waits for it, and it ends on its own
/// after `halt()` (or once this handle is dropped).
pub struct DispatchWorker {
    id: usize,
    settings: WorkerSettings,
    halt_tx: watch::Sender<bool>,
    state: Arc<SharedState>,
    metrics: Arc<WorkerMetrics>,
    task: Option<JoinHandle<()>>,
}

impl DispatchWorker {
    /// Create a worker in the `Created` state
    pub fn new(id: usize, settings: WorkerSettings) -> Self {
        let (halt_tx, _) = watch::channel(false);
        Self {
            id,
            settings,
            halt_tx,
            state: Arc::new(SharedState::default()),
            metrics: Arc::new(WorkerMetrics::new()),
            task: None,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn settings(&self) -> WorkerSettings {
        self.settings
    }

    pub fn state(&self) -> WorkerState {
        self.state.get()
    }

    /// Whether `halt()` has been called
    pub fn is_halted(&self) -> bool {
        *self.halt_tx.borrow()
    }

    pub fn metrics(&self) -> &Arc<WorkerMetrics> {
        &self.metrics
    }

    /// Spawn the worker task on the current Tokio runtime
    ///
    /// Only a `Created` worker starts; any other call is a no-op. Returns
    /// whether a task was spawned.
    pub fn start<S>(
        &mut self,
        queue: Arc<MetricsQueue>,
        sink: Arc<S>,
        probe: Arc<dyn CapabilityProbe>,
    ) -> bool
    where
        S: MetricSink + Sync + 'static,
    {
        if self.state() != WorkerState::Created || self.is_halted() {
            debug!(worker = self.id, state = ?self.state(), "Worker already started, ignoring");
            return false;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(worker = self.id, error = %e, "No Tokio runtime, worker not started");
                self.state.set(WorkerState::Halted);
                return false;
            }
        };

        self.state.set(WorkerState::Running);
        let context = WorkerContext {
            id: self.id,
            settings: self.settings,
            queue,
            sink,
            probe,
            halt_rx: self.halt_tx.subscribe(),
            state: Arc::clone(&self.state),
            metrics: Arc::clone(&self.metrics),
        };
        self.task = Some(runtime.spawn(context.run()));
        true
    }

    /// Ask the worker to stop as soon as possible
    ///
    /// Idempotent and non-blocking. Wakes the worker if it is waiting out its
    /// interval; a delivery already in flight still completes.
    pub fn halt(&self) {
        self.halt_tx.send_replace(true);
        if self.state() == WorkerState::Created {
            self.state.set(WorkerState::Halted);
        }
    }

    /// Whether the worker task has exited
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl std::fmt::Debug for DispatchWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchWorker")
            .field("id", &self.id)
            .field("settings", &self.settings)
            .field("state", &self.state())
            .field("halted", &self.is_halted())
            .finish()
    }
}

/// Everything the spawned task owns
struct WorkerContext<S> {
    id: usize,
    settings: WorkerSettings,
    queue: Arc<MetricsQueue>,
    sink: Arc<S>,
    probe: Arc<dyn CapabilityProbe>,
    halt_rx: watch::Receiver<bool>,
    state: Arc<SharedState>,
    metrics: Arc<WorkerMetrics>,
}

impl<S: MetricSink + Sync + 'static> WorkerContext<S> {
    #[instrument(
        name = "dispatch_worker_loop",
        skip(self),
        fields(worker = self.id, sink = %self.sink.name())
    )]
    async fn run(mut self) {
        if !self.probe.is_supported() {
            debug!(worker = self.id, "Metrics dispatch not supported, worker exiting");
            self.state.set(WorkerState::Halted);
            return;
        }

        observability::record_worker_started();
        debug!(
            worker = self.id,
            interval_ms = self.settings.interval.as_millis() as u64,
            batch_size = self.settings.batch_size,
            "Dispatch worker started"
        );

        while !*self.halt_rx.borrow() {
            let batch = self.queue.drain(Some(self.settings.batch_size));
            if !batch.is_empty() {
                self.dispatch(&batch).await;
            }

            if self.wait_or_halt().await {
                break;
            }
        }

        self.state.set(WorkerState::Halted);
        observability::record_worker_stopped();
        debug!(worker = self.id, "Dispatch worker stopped");
    }

    /// Deliver one batch. Failures are logged and counted, never retried.
    async fn dispatch(&self, batch: &[contracts::Metric]) {
        let sink_name = self.sink.name();
        match self.sink.deliver(batch).await {
            Ok(()) => {
                self.metrics.record_success(batch.len());
                observability::record_batch_delivered(sink_name, batch.len(), true);
                debug!(worker = self.id, sink = %sink_name, batch = batch.len(), "Batch delivered");
            }
            Err(e) => {
                self.metrics.record_failure(batch.len());
                observability::record_batch_delivered(sink_name, batch.len(), false);
                warn!(
                    worker = self.id,
                    sink = %sink_name,
                    batch = batch.len(),
                    error = %e,
                    "Batch delivery failed, metrics dropped"
                );
            }
        }
    }

    /// Sleep for one interval. Returns true if the worker should stop.
    async fn wait_or_halt(&mut self) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.settings.interval) => false,
            // Err means the handle was dropped; treat it as a halt.
            _ = self.halt_rx.wait_for(|halted| *halted) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ContractError, Metric};
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::time::{sleep, Instant};

    /// Sink recording every batch it receives
    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<Vec<String>>>,
        should_fail: bool,
    }

    impl RecordingSink {
        fn failing() -> Self {
            Self {
                should_fail: true,
                ..Default::default()
            }
        }

        fn batch_sizes(&self) -> Vec<usize> {
            self.batches.lock().unwrap().iter().map(Vec::len).collect()
        }
    }

    impl MetricSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn deliver(&self, batch: &[Metric]) -> Result<(), ContractError> {
            self.batches
                .lock()
                .unwrap()
                .push(batch.iter().map(|m| m.identity().to_string()).collect());
            if self.should_fail {
                return Err(ContractError::sink_delivery("recording", "mock failure"));
            }
            Ok(())
        }
    }

    fn fill(queue: &MetricsQueue, count: usize) {
        for i in 0..count {
            queue.enqueue(Metric::new(format!("m{i}"), json!(i)), false);
        }
    }

    fn settings(interval_ms: u64, batch_size: usize) -> WorkerSettings {
        WorkerSettings {
            interval: Duration::from_millis(interval_ms),
            batch_size,
        }
    }

    fn supported() -> Arc<dyn CapabilityProbe> {
        Arc::new(|| true)
    }

    #[tokio::test]
    async fn test_worker_delivers_in_bounded_batches() {
        let queue = Arc::new(MetricsQueue::new());
        fill(&queue, 25);
        let sink = Arc::new(RecordingSink::default());

        let mut worker = DispatchWorker::new(0, settings(10, 10));
        assert!(worker.start(Arc::clone(&queue), Arc::clone(&sink), supported()));
        assert_eq!(worker.state(), WorkerState::Running);

        sleep(Duration::from_millis(150)).await;
        worker.halt();

        assert_eq!(sink.batch_sizes(), vec![10, 10, 5]);
        assert!(queue.is_empty());
        assert_eq!(worker.metrics().delivered_count(), 25);
    }

    #[tokio::test]
    async fn test_worker_keeps_running_when_sink_fails() {
        let queue = Arc::new(MetricsQueue::new());
        fill(&queue, 30);
        let sink = Arc::new(RecordingSink::failing());

        let mut worker = DispatchWorker::new(0, settings(10, 10));
        worker.start(Arc::clone(&queue), Arc::clone(&sink), supported());

        sleep(Duration::from_millis(150)).await;
        assert_eq!(worker.state(), WorkerState::Running);
        assert_eq!(sink.batch_sizes().len(), 3);
        assert_eq!(worker.metrics().failure_count(), 3);
        assert_eq!(worker.metrics().lost_count(), 30);

        // Later metrics are still picked up.
        fill(&queue, 1);
        sleep(Duration::from_millis(50)).await;
        assert_eq!(sink.batch_sizes().len(), 4);

        worker.halt();
    }

    #[tokio::test]
    async fn test_unsupported_probe_exits_without_draining() {
        let queue = Arc::new(MetricsQueue::new());
        fill(&queue, 5);
        let sink = Arc::new(RecordingSink::default());

        let mut worker = DispatchWorker::new(0, settings(10, 10));
        worker.start(Arc::clone(&queue), Arc::clone(&sink), Arc::new(|| false));

        sleep(Duration::from_millis(50)).await;
        assert_eq!(worker.state(), WorkerState::Halted);
        assert!(worker.is_finished());
        assert_eq!(queue.len(), 5);
        assert!(sink.batch_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_halt_interrupts_interval() {
        let queue = Arc::new(MetricsQueue::new());
        let sink = Arc::new(RecordingSink::default());

        let mut worker = DispatchWorker::new(0, settings(60_000, 10));
        worker.start(queue, sink, supported());
        sleep(Duration::from_millis(20)).await;

        let halted_at = Instant::now();
        worker.halt();
        worker.halt();
        while !worker.is_finished() {
            assert!(halted_at.elapsed() < Duration::from_secs(1), "worker did not wake");
            sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(worker.state(), WorkerState::Halted);
    }

    #[tokio::test]
    async fn test_halted_worker_cannot_restart() {
        let queue = Arc::new(MetricsQueue::new());
        let sink = Arc::new(RecordingSink::default());

        let mut worker = DispatchWorker::new(0, settings(10, 10));
        worker.halt();
        assert_eq!(worker.state(), WorkerState::Halted);
        assert!(!worker.start(queue, sink, supported()));
    }

    #[test]
    fn test_start_without_runtime_is_noop() {
        let queue = Arc::new(MetricsQueue::new());
        let sink = Arc::new(RecordingSink::default());

        let mut worker = DispatchWorker::new(0, WorkerSettings::default());
        assert!(!worker.start(queue, sink, supported()));
        assert_eq!(worker.state(), WorkerState::Halted);
    }

    #[tokio::test]
    async fn test_dropped_handle_stops_worker() {
        let queue = Arc::new(MetricsQueue::new());
        let sink = Arc::new(RecordingSink::default());

        let mut worker = DispatchWorker::new(0, settings(60_000, 10));
        worker.start(Arc::clone(&queue), Arc::clone(&sink), supported());
        let state = Arc::clone(&worker.state);
        drop(worker);

        sleep(Duration::from_millis(50)).await;
        assert_eq!(state.get(), WorkerState::Halted);
    }
}
