//! Pure keep/delete decision over a snapshot of a group's runs.
//!
//! Running runs (and, under [`UnknownRunPolicy::Protect`], runs of unknown
//! state) are protected: they are never deleted and each consumes one slot of
//! the max-keep allowance. The remaining slots go to the most recently
//! completed runs.

use std::cmp::Ordering;

use crate::{
    config::UnknownRunPolicy,
    models::{RunRecord, RunState},
};

/// Outcome of planning: which runs survive and which are deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionPlan {
    /// Protected runs, sorted by name.
    pub protected: Vec<String>,
    /// Completed runs kept within budget, most recent first.
    pub retained: Vec<String>,
    /// Completed runs beyond budget, most recent first.
    pub delete: Vec<String>,
    /// Number of completed runs allowed to survive.
    pub budget: usize,
}

impl RetentionPlan {
    /// Every surviving run: protected first, then retained.
    pub fn keep(&self) -> Vec<String> {
        self.protected
            .iter()
            .chain(self.retained.iter())
            .cloned()
            .collect()
    }

    pub fn is_noop(&self) -> bool {
        self.delete.is_empty()
    }
}

/// Decide which runs to delete.
///
/// `max_keep` at or below zero leaves no budget, so only protected runs
/// survive.
pub fn plan_retention(
    runs: &[RunRecord],
    max_keep: i64,
    unknown_runs: UnknownRunPolicy,
) -> RetentionPlan {
    let (protected, mut candidates): (Vec<&RunRecord>, Vec<&RunRecord>) = runs
        .iter()
        .partition(|run| is_protected(run, unknown_runs));

    candidates.sort_by(|a, b| by_recency(a, b));

    let protected_count = i64::try_from(protected.len()).unwrap_or(i64::MAX);
    let budget = usize::try_from(max_keep.saturating_sub(protected_count).max(0))
        .unwrap_or(usize::MAX)
        .min(candidates.len());

    let mut protected: Vec<String> = protected.into_iter().map(|r| r.name.clone()).collect();
    protected.sort();

    let (retained, delete) = candidates.split_at(budget);

    RetentionPlan {
        protected,
        retained: retained.iter().map(|r| r.name.clone()).collect(),
        delete: delete.iter().map(|r| r.name.clone()).collect(),
        budget,
    }
}

/// Whether a run may never be deleted.
fn is_protected(run: &RunRecord, unknown_runs: UnknownRunPolicy) -> bool {
    match (run.state, run.completed_at) {
        (RunState::Running, _) => true,
        (state, Some(_)) if state.is_terminal() => false,
        // unknown state, or terminal without a completion time
        _ => unknown_runs == UnknownRunPolicy::Protect,
    }
}

/// Most recently completed first; runs without a completion time last;
/// ties by name.
fn by_recency(a: &RunRecord, b: &RunRecord) -> Ordering {
    let by_time = match (a.completed_at, b.completed_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_time.then_with(|| a.name.cmp(&b.name))
}
