use crate::{
    observability::metrics,
    retention::{
        context::InvocationContext,
        error::{DeletionFailure, RetentionError, RetentionResult},
    },
    store::{RunStore, StoreError},
};

/// What the executor did with a plan's deletions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    /// Deleted by this invocation.
    pub deleted: Vec<String>,
    /// Already gone when the delete was issued.
    pub already_absent: Vec<String>,
    /// Would have been deleted outside dry-run mode.
    pub dry_run: Vec<String>,
}

/// Delete each named run, in order.
///
/// Every deletion is attempted even if earlier ones fail; failures are
/// reported together as [`RetentionError::PartialDeletionFailure`]. A
/// not-found response counts as success. Cancellation is checked before each
/// delete is issued; a delete already in flight runs to completion (bounded by
/// the per-call timeout) and the rest are reported as not attempted.
pub async fn execute_deletions(
    store: &dyn RunStore,
    namespace: &str,
    names: &[String],
    ctx: &InvocationContext,
    dry_run: bool,
) -> RetentionResult<DeletionReport> {
    let mut report = DeletionReport::default();
    let mut failures = Vec::new();

    for (index, name) in names.iter().enumerate() {
        if dry_run {
            tracing::info!(
                namespace = namespace,
                run = %name,
                "DRY RUN: Would delete pipeline run"
            );
            report.dry_run.push(name.clone());
            continue;
        }

        if ctx.is_cancelled() {
            tracing::info!(
                namespace = namespace,
                deleted = report.deleted.len(),
                failed = failures.len(),
                remaining = names.len() - index,
                "Retention cancelled, skipping remaining deletions"
            );
            record_deletions(&report, failures.len());
            return Err(RetentionError::Cancelled {
                deleted: report.deleted,
                failures,
                remaining: names[index..].to_vec(),
            });
        }

        let result = tokio::time::timeout(ctx.call_timeout, store.delete(namespace, name))
            .await
            .unwrap_or_else(|_| Err(StoreError::Timeout(ctx.call_timeout)));

        match result {
            Ok(()) => {
                tracing::info!(namespace = namespace, run = %name, "Deleted old pipeline run");
                report.deleted.push(name.clone());
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    namespace = namespace,
                    run = %name,
                    "Pipeline run already deleted"
                );
                report.already_absent.push(name.clone());
            }
            Err(e) => {
                tracing::error!(
                    namespace = namespace,
                    run = %name,
                    error = %e,
                    "Failed to delete pipeline run"
                );
                failures.push(DeletionFailure {
                    name: name.clone(),
                    error: e,
                });
            }
        }
    }

    record_deletions(&report, failures.len());

    if failures.is_empty() {
        Ok(report)
    } else {
        Err(RetentionError::PartialDeletionFailure {
            failures,
            deleted: report.deleted,
        })
    }
}

fn record_deletions(report: &DeletionReport, failed: usize) {
    metrics::record_retention_deletions("deleted", report.deleted.len());
    metrics::record_retention_deletions("already_absent", report.already_absent.len());
    metrics::record_retention_deletions("dry_run", report.dry_run.len());
    metrics::record_retention_deletions("failed", failed);
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::{
        models::{RunRecord, RunState},
        store::{LabelSelector, MemoryRunStore, StoreResult},
    };

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn store_with(list: &[&str]) -> MemoryRunStore {
        MemoryRunStore::with_runs(
            list.iter()
                .map(|name| RunRecord::new(*name, "ci", RunState::Unknown, None)),
        )
    }

    fn ctx() -> InvocationContext {
        InvocationContext::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_deletes_all_planned() {
        let store = store_with(&["a", "b", "keep"]);
        let report = execute_deletions(&store, "ci", &names(&["a", "b"]), &ctx(), false)
            .await
            .unwrap();

        assert_eq!(report.deleted, names(&["a", "b"]));
        assert_eq!(store.names("ci"), names(&["keep"]));
    }

    #[tokio::test]
    async fn test_not_found_is_success() {
        let store = store_with(&["a"]);
        let report = execute_deletions(&store, "ci", &names(&["gone", "a"]), &ctx(), false)
            .await
            .unwrap();

        assert_eq!(report.already_absent, names(&["gone"]));
        assert_eq!(report.deleted, names(&["a"]));
    }

    #[tokio::test]
    async fn test_failure_does_not_short_circuit() {
        let store = store_with(&["a", "b", "c"]);
        store.fail_delete_of("b");

        let err = execute_deletions(&store, "ci", &names(&["a", "b", "c"]), &ctx(), false)
            .await
            .unwrap_err();

        assert_eq!(err.failed_runs(), vec!["b"]);
        let RetentionError::PartialDeletionFailure { deleted, .. } = &err else {
            panic!("expected partial deletion failure, got {err}");
        };
        assert_eq!(deleted, &names(&["a", "c"]));
        assert_eq!(store.names("ci"), names(&["b"]));
        assert_eq!(store.delete_attempts("c"), 1);
    }

    #[tokio::test]
    async fn test_dry_run_deletes_nothing() {
        let store = store_with(&["a", "b"]);
        let report = execute_deletions(&store, "ci", &names(&["a", "b"]), &ctx(), true)
            .await
            .unwrap();

        assert_eq!(report.dry_run, names(&["a", "b"]));
        assert!(report.deleted.is_empty());
        assert_eq!(store.len(), 2);
        assert_eq!(store.total_delete_attempts(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let store = store_with(&["a", "b"]);
        let ctx = ctx();
        ctx.cancel.cancel();

        let err = execute_deletions(&store, "ci", &names(&["a", "b"]), &ctx, false)
            .await
            .unwrap_err();

        let RetentionError::Cancelled {
            deleted,
            failures,
            remaining,
        } = err
        else {
            panic!("expected cancellation");
        };
        assert!(failures.is_empty());
        assert!(deleted.is_empty());
        assert_eq!(remaining, names(&["a", "b"]));
        assert_eq!(store.total_delete_attempts(), 0);
    }

    /// Cancels the invocation while the delete of `cancel_during` is in flight.
    struct CancelDuringDelete {
        inner: MemoryRunStore,
        cancel: CancellationToken,
        cancel_during: &'static str,
    }

    #[async_trait]
    impl RunStore for CancelDuringDelete {
        async fn list(&self, namespace: &str, selector: &LabelSelector) -> StoreResult<Vec<RunRecord>> {
            self.inner.list(namespace, selector).await
        }

        async fn delete(&self, namespace: &str, name: &str) -> StoreResult<()> {
            if name == self.cancel_during {
                self.cancel.cancel();
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            self.inner.delete(namespace, name).await
        }
    }

    #[tokio::test]
    async fn test_cancel_mid_plan_keeps_failures_and_issued_delete() {
        let cancel = CancellationToken::new();
        let store = CancelDuringDelete {
            inner: store_with(&["a", "b", "c"]),
            cancel: cancel.clone(),
            cancel_during: "b",
        };
        store.inner.fail_delete_of("a");
        let ctx = ctx().with_cancel(cancel);

        let err = execute_deletions(&store, "ci", &names(&["a", "b", "c"]), &ctx, false)
            .await
            .unwrap_err();

        assert_eq!(err.failed_runs(), vec!["a"]);
        let RetentionError::Cancelled {
            deleted, remaining, ..
        } = err
        else {
            panic!("expected cancellation");
        };
        assert_eq!(deleted, names(&["b"]));
        assert_eq!(remaining, names(&["c"]));
        assert!(store.inner.get("ci", "b").is_none());
        assert_eq!(store.inner.delete_attempts("c"), 0);
        assert_eq!(store.inner.names("ci"), names(&["a", "c"]));
    }

    #[tokio::test]
    async fn test_slow_delete_times_out_per_run() {
        let store = store_with(&["a"]).with_delete_delay(Duration::from_secs(5));
        let ctx = InvocationContext::new(Duration::from_millis(20));

        let err = execute_deletions(&store, "ci", &names(&["a"]), &ctx, false)
            .await
            .unwrap_err();

        let RetentionError::PartialDeletionFailure { failures, .. } = err else {
            panic!("expected partial deletion failure");
        };
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0].error, StoreError::Timeout(_)));
    }
}
