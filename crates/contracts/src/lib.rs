//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the relay.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Flow
//! - Producers build `Metric`s (usually via `EventMetric`)
//! - Workers hand batches to a `MetricSink`
//! - `CapabilityProbe` / `SessionAuth` gate whether anything is dispatched

mod config;
mod error;
mod gate;
mod metric;
mod sink;

pub use config::*;
pub use error::*;
pub use gate::*;
pub use metric::*;
pub use sink::*;
