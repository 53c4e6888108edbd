//! Retention worker for enforcing max-keep policies off the reconcile path.
//!
//! The event-handling side calls [`RetentionWorker::submit`] whenever a run
//! reaches a terminal state. Each submission becomes an independent task
//! tracked by the worker so that shutdown can cancel in-flight invocations
//! and wait for them to settle.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    config::RetentionConfig,
    models::{RepositoryRef, RunRecord},
    retention::{
        context::InvocationContext,
        enforce::{RetentionOutcome, enforce_retention},
        error::{RetentionError, RetentionResult},
        max_keep::resolve_max_keep,
    },
    store::RunStore,
};

/// Spawns and tracks retention invocations.
pub struct RetentionWorker {
    store: Arc<dyn RunStore>,
    config: Arc<RetentionConfig>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl RetentionWorker {
    pub fn new(store: Arc<dyn RunStore>, config: RetentionConfig) -> Self {
        if config.dry_run {
            tracing::info!("Starting retention worker (DRY RUN)");
        } else {
            tracing::info!(
                default_max_keep = ?config.default_max_keep,
                max_max_keep = ?config.max_max_keep,
                "Starting retention worker"
            );
        }

        Self {
            store,
            config: Arc::new(config),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    /// Enforce retention for the group of a run that just completed, using the
    /// max-keep resolved from the run's annotation and the configured limits.
    ///
    /// Returns `None` when retention is disabled, when no max-keep applies to
    /// the run, or after shutdown has begun.
    pub fn submit(
        &self,
        repository: RepositoryRef,
        triggering: RunRecord,
    ) -> Option<JoinHandle<RetentionResult<RetentionOutcome>>> {
        if !self.config.enabled {
            tracing::debug!(run = %triggering.name, "Retention disabled by configuration");
            return None;
        }

        let Some(max_keep) = resolve_max_keep(&triggering, &self.config) else {
            tracing::debug!(run = %triggering.name, "No max-keep configured for run");
            return None;
        };

        self.submit_with(repository, triggering, max_keep)
    }

    /// Enforce retention with an explicit max-keep.
    pub fn submit_with(
        &self,
        repository: RepositoryRef,
        triggering: RunRecord,
        max_keep: i64,
    ) -> Option<JoinHandle<RetentionResult<RetentionOutcome>>> {
        if self.tracker.is_closed() || self.shutdown.is_cancelled() {
            tracing::warn!(
                run = %triggering.name,
                "Retention worker is shutting down, dropping submission"
            );
            return None;
        }

        let store = Arc::clone(&self.store);
        let config = Arc::clone(&self.config);
        let ctx = InvocationContext::from_config(&config).with_cancel(self.shutdown.child_token());

        Some(self.tracker.spawn(async move {
            let result = enforce_retention(
                store.as_ref(),
                &config,
                &ctx,
                &repository,
                &triggering,
                max_keep,
            )
            .await;
            log_result(&repository, &triggering, config.dry_run, &result);
            result
        }))
    }

    /// Number of invocations that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting submissions, cancel in-flight invocations and wait for
    /// them to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.shutdown.cancel();
        self.tracker.wait().await;
        tracing::info!("Retention worker stopped");
    }
}

fn log_result(
    repository: &RepositoryRef,
    triggering: &RunRecord,
    dry_run: bool,
    result: &RetentionResult<RetentionOutcome>,
) {
    let dry_run_msg = if dry_run { " (DRY RUN)" } else { "" };

    match result {
        Ok(outcome) if outcome.planned() > 0 => {
            tracing::info!(
                repository = %repository,
                run = %triggering.name,
                kept = outcome.kept.len(),
                deleted = outcome.deleted.len(),
                already_absent = outcome.already_absent.len(),
                dry_run = outcome.dry_run.len(),
                "Retention complete{}",
                dry_run_msg
            );
        }
        Ok(_) => {
            tracing::debug!(run = %triggering.name, "Retention complete, no runs to delete");
        }
        Err(RetentionError::InvalidGroupKey(_)) => {
            // Already logged where the group key was rejected.
        }
        Err(e @ RetentionError::Cancelled { .. }) => {
            tracing::warn!(repository = %repository, run = %triggering.name, error = %e, "Retention cancelled");
        }
        Err(e) => {
            tracing::error!(
                repository = %repository,
                run = %triggering.name,
                error = %e,
                "Error running retention"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{
        config::RetentionLabels,
        models::RunState,
        store::MemoryRunStore,
    };

    fn run(name: &str, state: RunState, minute: u32) -> RunRecord {
        let labels = RetentionLabels::default();
        let completed = Utc.with_ymd_and_hms(2025, 3, 1, 12, minute, 0).unwrap();
        RunRecord::new(name, "ci", state, Some(completed))
            .with_label(labels.repository, "app")
            .with_label(labels.original_run, "push")
    }

    fn config() -> RetentionConfig {
        RetentionConfig {
            default_max_keep: Some(1),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_submit_enforces_default_max_keep() {
        let store = Arc::new(MemoryRunStore::with_runs([
            run("r1", RunState::Succeeded, 1),
            run("r2", RunState::Succeeded, 2),
        ]));
        let worker = RetentionWorker::new(store.clone(), config());

        let handle = worker
            .submit(RepositoryRef::new("ci", "app"), run("r2", RunState::Succeeded, 2))
            .expect("submission accepted");
        let outcome = handle.await.unwrap().unwrap();

        assert_eq!(outcome.deleted, vec!["r1".to_string()]);
        assert_eq!(store.names("ci"), vec!["r2".to_string()]);
    }

    #[tokio::test]
    async fn test_submit_skips_when_disabled() {
        let store = Arc::new(MemoryRunStore::new());
        let worker = RetentionWorker::new(
            store,
            RetentionConfig {
                enabled: false,
                ..config()
            },
        );

        let handle = worker.submit(RepositoryRef::new("ci", "app"), run("r1", RunState::Succeeded, 1));
        assert!(handle.is_none());
    }

    #[tokio::test]
    async fn test_submit_skips_without_max_keep() {
        let store = Arc::new(MemoryRunStore::new());
        let worker = RetentionWorker::new(store, RetentionConfig::default());

        let handle = worker.submit(RepositoryRef::new("ci", "app"), run("r1", RunState::Succeeded, 1));
        assert!(handle.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_in_flight() {
        let store = Arc::new(
            MemoryRunStore::with_runs([
                run("r1", RunState::Succeeded, 1),
                run("r2", RunState::Succeeded, 2),
                run("r3", RunState::Succeeded, 3),
            ])
            .with_delete_delay(Duration::from_millis(300)),
        );
        let worker = RetentionWorker::new(store.clone(), config());

        let handle = worker
            .submit(RepositoryRef::new("ci", "app"), run("r3", RunState::Succeeded, 3))
            .expect("submission accepted");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(worker.in_flight(), 1);

        worker.shutdown().await;
        assert_eq!(worker.in_flight(), 0);

        // the in-flight delete of r2 completes, r1 is never issued
        let err = handle.await.unwrap().unwrap_err();
        let RetentionError::Cancelled {
            deleted, remaining, ..
        } = err
        else {
            panic!("expected cancellation");
        };
        assert_eq!(deleted, vec!["r2".to_string()]);
        assert_eq!(remaining, vec!["r1".to_string()]);
        assert!(store.get("ci", "r1").is_some());
        assert!(store.get("ci", "r2").is_none());

        let late = worker.submit(RepositoryRef::new("ci", "app"), run("r3", RunState::Succeeded, 3));
        assert!(late.is_none());
    }
}
