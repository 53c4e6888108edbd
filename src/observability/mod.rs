//! Observability module providing logging and metrics.
//!
//! - Structured logging with configurable formats (pretty, compact, JSON)
//! - Prometheus counters for retention invocations and deletions

pub mod metrics;
mod tracing_init;

pub use tracing_init::*;
