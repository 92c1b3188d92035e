//! Dispatcher - lifecycle manager for dispatch workers

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use contracts::{
    CapabilityProbe, MetricSink, PipelineConfig, ServerVersion, ServerVersionProbe, SessionAuth,
    StaticSession,
};

use crate::error::DispatcherError;
use crate::metrics::MetricsSnapshot;
use crate::queue::MetricsQueue;
use crate::sinks::ConfiguredSink;
use crate::worker::{DispatchWorker, WorkerSettings};

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder<S> {
    queue: Arc<MetricsQueue>,
    sink: Arc<S>,
    probe: Arc<dyn CapabilityProbe>,
    session: Arc<dyn SessionAuth>,
    settings: WorkerSettings,
}

impl<S: MetricSink + Sync + 'static> DispatcherBuilder<S> {
    /// Create a builder delivering from `queue` into `sink`
    ///
    /// Defaults: dispatch always supported, no authenticated session, default
    /// interval and batch size.
    pub fn new(queue: Arc<MetricsQueue>, sink: S) -> Self {
        Self {
            queue,
            sink: Arc::new(sink),
            probe: Arc::new(|| true),
            session: Arc::new(StaticSession::anonymous()),
            settings: WorkerSettings::default(),
        }
    }

    pub fn probe(mut self, probe: Arc<dyn CapabilityProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn session(mut self, session: Arc<dyn SessionAuth>) -> Self {
        self.session = session;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.settings.interval = interval;
        self
    }

    /// Maximum metrics per batch (0 = whole queue)
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.settings.batch_size = batch_size;
        self
    }

    pub fn build(self) -> Dispatcher<S> {
        Dispatcher {
            queue: self.queue,
            sink: self.sink,
            probe: self.probe,
            session: self.session,
            settings: self.settings,
            workers: Vec::new(),
            dispatching: false,
        }
    }
}

/// Owns the dispatch workers of one relay
pub struct Dispatcher<S> {
    queue: Arc<MetricsQueue>,
    sink: Arc<S>,
    probe: Arc<dyn CapabilityProbe>,
    session: Arc<dyn SessionAuth>,
    settings: WorkerSettings,
    workers: Vec<DispatchWorker>,
    dispatching: bool,
}

impl<S: MetricSink + Sync + 'static> Dispatcher<S> {
    /// Start `worker_count` workers
    ///
    /// No-op if already dispatching, or if there is no authenticated session.
    /// Must be called from within a Tokio runtime.
    #[instrument(name = "dispatcher_start", skip(self), fields(sink = %self.sink.name()))]
    pub fn start(&mut self, worker_count: usize) {
        if self.dispatching {
            debug!("Metrics dispatching already started, doing nothing");
            return;
        }

        if !self.session.has_authenticated_session() {
            debug!("No authenticated session, metrics dispatching not started");
            return;
        }

        if worker_count == 0 {
            warn!("Dispatcher started with zero workers, metrics will stay queued");
        }

        for id in 0..worker_count {
            let mut worker = DispatchWorker::new(id, self.settings);
            worker.start(
                Arc::clone(&self.queue),
                Arc::clone(&self.sink),
                Arc::clone(&self.probe),
            );
            debug!(worker = ?worker, "Added dispatch worker");
            self.workers.push(worker);
        }

        self.dispatching = true;
        info!(workers = worker_count, "Metrics dispatching started");
    }

    /// Halt every worker and forget them
    ///
    /// Does not wait for the workers to exit; a batch already being delivered
    /// still goes out.
    #[instrument(name = "dispatcher_stop", skip(self))]
    pub fn stop(&mut self) {
        for worker in &self.workers {
            worker.halt();
        }

        if self.dispatching {
            info!(workers = self.workers.len(), "Metrics dispatching stopped");
        }
        self.workers.clear();
        self.dispatching = false;
    }

    /// True between a successful `start()` and the matching `stop()`
    pub fn dispatching(&self) -> bool {
        self.dispatching
    }

    /// Workers started by the current `start()`
    pub fn workers(&self) -> &[DispatchWorker] {
        &self.workers
    }

    pub fn queue(&self) -> &Arc<MetricsQueue> {
        &self.queue
    }

    pub fn sink(&self) -> &Arc<S> {
        &self.sink
    }

    /// Get metrics for all current workers
    pub fn worker_metrics(&self) -> Vec<(usize, MetricsSnapshot)> {
        self.workers
            .iter()
            .map(|w| (w.id(), w.metrics().snapshot()))
            .collect()
    }

    /// Sum of all current workers' metrics
    pub fn total_metrics(&self) -> MetricsSnapshot {
        self.workers
            .iter()
            .map(|w| w.metrics().snapshot())
            .fold(MetricsSnapshot::default(), |acc, s| acc + s)
    }
}

/// Convenience function to create a dispatcher from a loaded configuration
///
/// The capability probe is derived from `server.version`; the sink from
/// `sink`. Workers are not started.
#[instrument(name = "dispatcher_create", skip_all, fields(sink = %config.sink.name))]
pub fn create_dispatcher(
    config: &PipelineConfig,
    queue: Arc<MetricsQueue>,
    session: Arc<dyn SessionAuth>,
) -> Result<Dispatcher<ConfiguredSink>, DispatcherError> {
    let version = config
        .server
        .version
        .as_deref()
        .map(str::parse::<ServerVersion>)
        .transpose()?;

    let sink = ConfiguredSink::from_config(
        &config.sink,
        config.server.base_url.as_deref(),
        Arc::clone(&session),
    )?;

    Ok(DispatcherBuilder::new(queue, sink)
        .probe(Arc::new(ServerVersionProbe::new(version)))
        .session(session)
        .interval(config.dispatch.interval())
        .batch_size(config.dispatch.batch_size)
        .build())
}
