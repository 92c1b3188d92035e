//! # Dispatcher
//!
//! Metric queue and background delivery.
//!
//! Responsibilities:
//! - Accept metrics from producers without blocking (`MetricsQueue`)
//! - Drop repeated "log once" metrics
//! - Drain bounded batches on a fixed interval and hand them to a sink
//! - Start/stop workers idempotently (`Dispatcher`)

pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod producer;
pub mod queue;
pub mod sinks;
pub mod worker;

pub use contracts::{Metric, MetricSink};
pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherBuilder};
pub use error::DispatcherError;
pub use metrics::{MetricsSnapshot, QueueMetrics, WorkerMetrics};
pub use producer::{enqueue_event, log_event_metric};
pub use queue::{EnqueueOutcome, MetricsQueue};
pub use sinks::{ConfiguredSink, FileSink, HttpSink, LogSink};
pub use worker::{DispatchWorker, WorkerSettings, WorkerState};
