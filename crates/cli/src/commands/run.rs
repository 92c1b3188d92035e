//! `run` command implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use config_loader::ConfigLoader;
use contracts::{SessionAuth, StaticSession};
use dispatcher::{create_dispatcher, enqueue_event, ConfiguredSink, Dispatcher, EnqueueOutcome, MetricsQueue};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::events::{read_events, EventLine};

/// How often delivery progress is checked while lingering
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Execute the `run` command
pub async fn run_relay(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut config = ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if let Some(workers) = args.workers {
        anyhow::ensure!(
            (1..=64).contains(&workers),
            "--workers must be between 1 and 64, got {workers}"
        );
        config.dispatch.num_workers = workers;
    }

    info!(
        sink = %config.sink.name,
        sink_type = ?config.sink.sink_type,
        workers = config.dispatch.num_workers,
        interval_ms = config.dispatch.interval_ms,
        "Configuration loaded successfully"
    );

    let events = read_events(&args.events)?;
    info!(count = events.len(), source = %args.events, "Events loaded");

    if args.dry_run {
        info!("Dry run mode - configuration and events are valid, exiting");
        println!(
            "✅ {} event(s) would be dispatched via sink '{}'",
            events.len(),
            config.sink.name
        );
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
        info!(port = args.metrics_port, "Prometheus exporter listening");
    }

    let session: Arc<dyn SessionAuth> =
        Arc::new(StaticSession::from_option(args.session_token.clone()));
    if !session.has_authenticated_session() {
        warn!("No session token provided; metrics will stay queued");
    }

    let queue = MetricsQueue::global();
    let mut dispatcher = create_dispatcher(&config, Arc::clone(&queue), session)?;
    dispatcher.start(config.dispatch.num_workers);

    let counts = enqueue_all(&queue, events)?;
    info!(
        queued = counts.queued,
        deduplicated = counts.deduplicated,
        dropped = counts.dropped,
        "Events enqueued"
    );

    let outcome = if dispatcher.dispatching() {
        let linger = (args.linger > 0).then(|| Duration::from_secs(args.linger));
        wait_for_delivery(&dispatcher, counts.queued, linger).await
    } else {
        WaitOutcome::NotDispatching
    };

    let summary = RunSummary {
        counts,
        delivered: dispatcher.total_metrics().delivered_count,
        lost: dispatcher.total_metrics().lost_count,
        failed_batches: dispatcher.total_metrics().failure_count,
        left_in_queue: queue.len(),
        outcome,
    };

    dispatcher.stop();
    summary.print();

    info!("Telemetry relay finished");
    Ok(())
}

/// Per-outcome enqueue counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct EnqueueCounts {
    queued: u64,
    deduplicated: u64,
    dropped: u64,
}

impl EnqueueCounts {
    fn record(&mut self, outcome: EnqueueOutcome) {
        match outcome {
            EnqueueOutcome::Queued => self.queued += 1,
            EnqueueOutcome::Deduplicated => self.deduplicated += 1,
            EnqueueOutcome::Dropped => self.dropped += 1,
        }
    }
}

fn enqueue_all(queue: &MetricsQueue, events: Vec<EventLine>) -> Result<EnqueueCounts, CliError> {
    let mut counts = EnqueueCounts::default();
    for event in events {
        let outcome = enqueue_event(
            queue,
            &event.group,
            &event.name,
            event.properties,
            event.dedupe,
        )
        .map_err(|e| CliError::event_rejected(event.line, e.to_string()))?;
        counts.record(outcome);
    }
    Ok(counts)
}

/// Why lingering ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitOutcome {
    /// Every queued metric was handed to the sink
    Settled,
    /// All workers exited (dispatch unsupported by the server)
    WorkersHalted,
    /// Linger timeout elapsed
    TimedOut,
    /// Ctrl+C or SIGTERM
    Interrupted,
    /// Dispatcher never started
    NotDispatching,
}

/// Wait until `expected` metrics were delivered or lost
async fn wait_for_delivery(
    dispatcher: &Dispatcher<ConfiguredSink>,
    expected: u64,
    linger: Option<Duration>,
) -> WaitOutcome {
    let deadline = linger.map(|d| Instant::now() + d);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let total = dispatcher.total_metrics();
        if total.delivered_count + total.lost_count >= expected {
            return WaitOutcome::Settled;
        }
        if dispatcher.workers().iter().all(|w| w.is_finished()) {
            warn!("All dispatch workers exited before the queue drained");
            return WaitOutcome::WorkersHalted;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            warn!("Linger timeout elapsed, stopping with metrics still pending");
            return WaitOutcome::TimedOut;
        }

        tokio::select! {
            _ = &mut shutdown => {
                warn!("Received shutdown signal, stopping dispatcher...");
                return WaitOutcome::Interrupted;
            }
            _ = sleep(POLL_INTERVAL) => {}
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

struct RunSummary {
    counts: EnqueueCounts,
    delivered: u64,
    lost: u64,
    failed_batches: u64,
    left_in_queue: usize,
    outcome: WaitOutcome,
}

impl RunSummary {
    fn print(&self) {
        println!("\n📊 Relay Summary");
        println!("   ├─ Queued: {}", self.counts.queued);
        println!("   ├─ Deduplicated: {}", self.counts.deduplicated);
        if self.counts.dropped > 0 {
            println!("   ├─ Dropped: {}", self.counts.dropped);
        }
        println!("   ├─ Delivered: {}", self.delivered);
        println!(
            "   ├─ Lost: {} ({} failed batches)",
            self.lost, self.failed_batches
        );
        println!("   ├─ Left in queue: {}", self.left_in_queue);
        println!("   └─ Ended: {:?}", self.outcome);
        println!();
    }
}
