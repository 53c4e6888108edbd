//! Prometheus metrics for retention enforcement.
//!
//! Provides counters for:
//! - Retention invocations by outcome
//! - Run deletions by result

#[cfg(feature = "prometheus")]
use std::sync::OnceLock;

#[cfg(feature = "prometheus")]
use metrics::counter;
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::MetricsConfig;

/// Global Prometheus handle for rendering.
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the metrics system with the given configuration.
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(MetricsError::Install)?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::Setup("Metrics already initialized".to_string()))?;

    Ok(())
}

/// Initialize the metrics system (no-op without prometheus feature).
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(_config: &MetricsConfig) -> Result<(), MetricsError> {
    Ok(())
}

/// Render the current metrics in the Prometheus text format.
///
/// Returns `None` if metrics were never initialized.
pub fn render() -> Option<String> {
    #[cfg(feature = "prometheus")]
    {
        PROMETHEUS_HANDLE.get().map(|handle| handle.render())
    }
    #[cfg(not(feature = "prometheus"))]
    {
        None
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Metric Recording Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Record a retention invocation.
///
/// # Arguments
/// * `outcome` - `"success"` or the error kind (e.g., "invalid_group_key",
///   "store_unavailable", "partial_deletion_failure", "cancelled")
pub fn record_retention_invocation(outcome: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "run_retention_invocations_total",
            "outcome" => outcome.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = outcome;
    }
}

/// Record run deletions performed by a retention invocation.
///
/// # Arguments
/// * `result` - One of "deleted", "already_absent", "failed", "dry_run"
/// * `count` - The number of runs with that result
pub fn record_retention_deletions(result: &str, count: usize) {
    if count == 0 {
        return;
    }

    #[cfg(feature = "prometheus")]
    {
        counter!(
            "run_retention_deletions_total",
            "result" => result.to_string()
        )
        .increment(count as u64);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = result;
    }
}

/// Metrics initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to set up metrics: {0}")]
    Setup(String),

    #[cfg(feature = "prometheus")]
    #[error("Failed to install metrics recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}
