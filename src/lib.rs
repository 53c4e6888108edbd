//! Max-keep retention for CI pipeline runs.
//!
//! After a pipeline run completes, [`enforce_retention`] deletes the oldest
//! completed runs generated from the same pipeline definition in the same
//! repository so that at most `max_keep` runs remain, never touching a run that
//! is still executing.
//!
//! ```ignore
//! let config = RunRetentionConfig::from_file("retention.toml")?;
//! init_tracing(&config.observability.logging)?;
//!
//! let store = create_store(&config.store).await?;
//! let worker = RetentionWorker::new(store, config.retention);
//!
//! // On each completed run:
//! worker.submit(repository, run);
//!
//! // On shutdown:
//! worker.shutdown().await;
//! ```

pub mod config;
pub mod models;
pub mod observability;
pub mod retention;
pub mod store;

#[cfg(test)]
mod tests;

pub use config::RunRetentionConfig;
pub use models::{RepositoryRef, RunRecord, RunState};
pub use observability::{init_tracing, metrics::init_metrics};
pub use retention::{
    InvocationContext, RetentionError, RetentionOutcome, RetentionWorker, enforce_retention,
};
pub use store::{KubeRunStore, MemoryRunStore, RunStore, StoreError, create_store};
