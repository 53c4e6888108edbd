use thiserror::Error;

use crate::store::StoreError;

/// A planned deletion that did not succeed.
#[derive(Debug, Error)]
#[error("{name}: {error}")]
pub struct DeletionFailure {
    /// Name of the run record that is still present in the store
    pub name: String,
    #[source]
    pub error: StoreError,
}

#[derive(Debug, Error)]
pub enum RetentionError {
    /// The triggering run does not identify a retention group.
    #[error("Invalid group key: {0}")]
    InvalidGroupKey(String),

    /// Listing failed; nothing was deleted.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// Some deletions failed. Successful deletions remain applied.
    #[error("Failed to delete {} run(s): {}", .failures.len(), join_failures(.failures))]
    PartialDeletionFailure {
        failures: Vec<DeletionFailure>,
        deleted: Vec<String>,
    },

    /// The invocation was cancelled before every planned deletion was issued.
    /// Deletions already issued are not rolled back.
    #[error(
        "Cancelled after deleting {} run(s), {} not attempted{}",
        .deleted.len(),
        .remaining.len(),
        cancelled_failures(.failures)
    )]
    Cancelled {
        deleted: Vec<String>,
        /// Deletions issued before cancellation that failed
        failures: Vec<DeletionFailure>,
        /// Planned deletions never issued
        remaining: Vec<String>,
    },
}

impl RetentionError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RetentionError::InvalidGroupKey(_) => "invalid_group_key",
            RetentionError::StoreUnavailable(_) => "store_unavailable",
            RetentionError::PartialDeletionFailure { .. } => "partial_deletion_failure",
            RetentionError::Cancelled { .. } => "cancelled",
        }
    }

    /// Names of runs whose deletion failed, if any.
    pub fn failed_runs(&self) -> Vec<&str> {
        match self {
            RetentionError::PartialDeletionFailure { failures, .. }
            | RetentionError::Cancelled { failures, .. } => {
                failures.iter().map(|f| f.name.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

fn join_failures(failures: &[DeletionFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn cancelled_failures(failures: &[DeletionFailure]) -> String {
    if failures.is_empty() {
        String::new()
    } else {
        format!(
            ", failed to delete {} run(s): {}",
            failures.len(),
            join_failures(failures)
        )
    }
}

pub type RetentionResult<T> = Result<T, RetentionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_failure_names_each_run() {
        let err = RetentionError::PartialDeletionFailure {
            failures: vec![
                DeletionFailure {
                    name: "run-a".into(),
                    error: StoreError::Unavailable("connection reset".into()),
                },
                DeletionFailure {
                    name: "run-b".into(),
                    error: StoreError::Rejected {
                        status: 403,
                        message: "forbidden".into(),
                    },
                },
            ],
            deleted: vec!["run-c".into()],
        };

        let msg = err.to_string();
        assert!(msg.starts_with("Failed to delete 2 run(s)"), "{msg}");
        assert!(msg.contains("run-a: Store unavailable: connection reset"), "{msg}");
        assert!(msg.contains("run-b: Request rejected with status 403"), "{msg}");
        assert!(!msg.contains("run-c"), "{msg}");
        assert_eq!(err.failed_runs(), vec!["run-a", "run-b"]);
        assert_eq!(err.kind(), "partial_deletion_failure");
    }

    #[test]
    fn test_cancelled_message() {
        let err = RetentionError::Cancelled {
            deleted: vec!["a".into()],
            failures: Vec::new(),
            remaining: vec!["b".into(), "c".into()],
        };
        assert_eq!(
            err.to_string(),
            "Cancelled after deleting 1 run(s), 2 not attempted"
        );
        assert!(err.failed_runs().is_empty());
    }

    #[test]
    fn test_cancelled_keeps_earlier_failures() {
        let err = RetentionError::Cancelled {
            deleted: vec!["b".into()],
            failures: vec![DeletionFailure {
                name: "a".into(),
                error: StoreError::Unavailable("connection reset".into()),
            }],
            remaining: vec!["c".into()],
        };
        assert_eq!(
            err.to_string(),
            "Cancelled after deleting 1 run(s), 1 not attempted, failed to delete 1 run(s): \
             a: Store unavailable: connection reset"
        );
        assert_eq!(err.failed_runs(), vec!["a"]);
        assert_eq!(err.kind(), "cancelled");
    }
}
