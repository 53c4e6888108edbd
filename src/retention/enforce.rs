use crate::{
    config::RetentionConfig,
    models::{RepositoryRef, RunRecord},
    observability::metrics,
    retention::{
        context::InvocationContext,
        error::{RetentionError, RetentionResult},
        executor::execute_deletions,
        group::GroupKey,
        lister::list_group_runs,
        planner::plan_retention,
    },
    store::RunStore,
};

/// Results from a single retention invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionOutcome {
    /// Runs left in place: protected first, then retained.
    pub kept: Vec<String>,
    /// Runs deleted by this invocation.
    pub deleted: Vec<String>,
    /// Planned runs that were already gone.
    pub already_absent: Vec<String>,
    /// Planned runs left in place because of dry-run mode.
    pub dry_run: Vec<String>,
}

impl RetentionOutcome {
    /// Check if anything was removed from the store.
    pub fn has_deletions(&self) -> bool {
        !self.deleted.is_empty()
    }

    /// Number of runs the plan selected for deletion.
    pub fn planned(&self) -> usize {
        self.deleted.len() + self.already_absent.len() + self.dry_run.len()
    }
}

/// Enforce the max-keep policy for the group of the run that just completed.
///
/// Resolves the group from `triggering`'s labels, lists the group's runs from
/// `store`, keeps every running run plus the most recently completed ones up
/// to `max_keep` in total, and deletes the rest.
///
/// # Errors
///
/// - [`RetentionError::InvalidGroupKey`] before any store access
/// - [`RetentionError::StoreUnavailable`] if listing fails; nothing is deleted
/// - [`RetentionError::PartialDeletionFailure`] naming each run that could not
///   be deleted
/// - [`RetentionError::Cancelled`] if `ctx` is cancelled
pub async fn enforce_retention(
    store: &dyn RunStore,
    config: &RetentionConfig,
    ctx: &InvocationContext,
    repository: &RepositoryRef,
    triggering: &RunRecord,
    max_keep: i64,
) -> RetentionResult<RetentionOutcome> {
    let result = run_enforcement(store, config, ctx, repository, triggering, max_keep).await;

    match &result {
        Ok(_) => metrics::record_retention_invocation("success"),
        Err(e) => metrics::record_retention_invocation(e.kind()),
    }

    result
}

async fn run_enforcement(
    store: &dyn RunStore,
    config: &RetentionConfig,
    ctx: &InvocationContext,
    repository: &RepositoryRef,
    triggering: &RunRecord,
    max_keep: i64,
) -> RetentionResult<RetentionOutcome> {
    let key = match GroupKey::resolve(repository, triggering, &config.labels) {
        Ok(key) => key,
        Err(e) => {
            tracing::warn!(
                repository = %repository,
                run = %triggering.name,
                error = %e,
                "Skipping retention for run without a valid group key"
            );
            return Err(e);
        }
    };

    tracing::info!(
        namespace = key.namespace(),
        selector = %key.selector(),
        max_keep = max_keep,
        "Selecting pipeline runs for retention"
    );

    let runs = match list_group_runs(store, &key, ctx).await {
        Ok(runs) => runs,
        Err(e) => {
            if matches!(e, RetentionError::StoreUnavailable(_)) {
                tracing::error!(group = %key, error = %e, "Failed to list pipeline runs");
            }
            return Err(e);
        }
    };

    let plan = plan_retention(&runs, max_keep, config.unknown_runs);

    for name in &plan.protected {
        tracing::debug!(run = %name, "Keeping pipeline run that has not completed");
    }

    if plan.is_noop() {
        tracing::debug!(
            group = %key,
            runs = runs.len(),
            "Nothing to clean up"
        );
        return Ok(RetentionOutcome {
            kept: plan.keep(),
            ..Default::default()
        });
    }

    tracing::info!(
        group = %key,
        protected = plan.protected.len(),
        retained = plan.retained.len(),
        to_delete = plan.delete.len(),
        dry_run = config.dry_run,
        "Cleaning old pipeline runs"
    );

    let report = execute_deletions(store, key.namespace(), &plan.delete, ctx, config.dry_run).await?;

    Ok(RetentionOutcome {
        kept: plan.keep(),
        deleted: report.deleted,
        already_absent: report.already_absent,
        dry_run: report.dry_run,
    })
}
