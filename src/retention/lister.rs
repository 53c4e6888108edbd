use crate::{
    models::RunRecord,
    retention::{
        context::InvocationContext,
        error::{RetentionError, RetentionResult},
        group::GroupKey,
    },
    store::{RunStore, StoreError},
};

/// Fetch every run in the group from the store.
///
/// Fails closed: any listing error, timeout or cancellation aborts the
/// invocation before anything is deleted. Records the store returns outside
/// the group are dropped.
pub async fn list_group_runs(
    store: &dyn RunStore,
    key: &GroupKey,
    ctx: &InvocationContext,
) -> RetentionResult<Vec<RunRecord>> {
    let selector = key.selector();

    let listed = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => {
            return Err(RetentionError::Cancelled {
                deleted: Vec::new(),
                failures: Vec::new(),
                remaining: Vec::new(),
            });
        }
        result = tokio::time::timeout(ctx.call_timeout, store.list(key.namespace(), &selector)) => result,
    };

    let runs = match listed {
        Ok(Ok(runs)) => runs,
        Ok(Err(e)) => return Err(RetentionError::StoreUnavailable(e)),
        Err(_) => {
            return Err(RetentionError::StoreUnavailable(StoreError::Timeout(
                ctx.call_timeout,
            )));
        }
    };

    let total = runs.len();
    let runs: Vec<RunRecord> = runs.into_iter().filter(|run| key.contains(run)).collect();
    if runs.len() != total {
        tracing::debug!(
            group = %key,
            dropped = total - runs.len(),
            "Store returned runs outside the retention group"
        );
    }

    Ok(runs)
}
