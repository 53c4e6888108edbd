//! Max-keep retention for pipeline runs.
//!
//! When a run completes, the runs generated from the same pipeline definition
//! in the same repository form a retention group. Enforcement proceeds in four
//! stages:
//! 1. Resolve the group key from the triggering run's labels
//! 2. List the group's runs from the run store
//! 3. Plan which runs to keep: every unfinished run, then the most recently
//!    completed ones up to the max-keep budget
//! 4. Delete the remainder, tolerating runs that are already gone
//!
//! Enforcement fails closed: if the group cannot be listed, nothing is
//! deleted. Dry-run mode logs planned deletions without issuing them.

mod context;
mod enforce;
mod error;
mod executor;
mod group;
mod lister;
mod max_keep;
mod planner;
mod worker;

pub use context::InvocationContext;
pub use enforce::{RetentionOutcome, enforce_retention};
pub use error::{DeletionFailure, RetentionError, RetentionResult};
pub use executor::{DeletionReport, execute_deletions};
pub use group::GroupKey;
pub use lister::list_group_runs;
pub use max_keep::resolve_max_keep;
pub use planner::{RetentionPlan, plan_retention};
pub use worker::RetentionWorker;
