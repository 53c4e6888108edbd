use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Labels and annotations attached to a run record.
pub type Labels = BTreeMap<String, String>;

/// Reasons reported on the `Succeeded` condition when a run was cancelled.
const CANCELLED_REASONS: &[&str] = &[
    "Cancelled",
    "PipelineRunCancelled",
    "StoppedRunFinally",
    "CancelledRunFinally",
];

/// Lifecycle state of a run record.
///
/// Only [`RunState::Running`] is unconditionally protected from deletion.
/// [`RunState::Unknown`] is protected or deleted depending on
/// [`UnknownRunPolicy`](crate::config::UnknownRunPolicy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Still executing (pending, started or running).
    Running,
    Succeeded,
    Failed,
    Cancelled,
    /// No usable status was reported, or a terminal reason arrived without a
    /// completion timestamp.
    Unknown,
}

impl RunState {
    /// Whether the run has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Succeeded | RunState::Failed | RunState::Cancelled
        )
    }

    /// Classify a `Succeeded` condition (`status` is `"True"`, `"False"` or
    /// `"Unknown"`) into a lifecycle state.
    ///
    /// A missing condition status falls back to [`RunState::from_reason`].
    pub fn from_condition(status: Option<&str>, reason: Option<&str>) -> Self {
        match status {
            Some("Unknown") => RunState::Running,
            Some("True") => RunState::Succeeded,
            Some("False") => match reason {
                Some(r) if CANCELLED_REASONS.contains(&r) => RunState::Cancelled,
                _ => RunState::Failed,
            },
            Some(_) => RunState::Unknown,
            None => reason.map(RunState::from_reason).unwrap_or(RunState::Unknown),
        }
    }

    /// Classify a bare reason code into a lifecycle state.
    pub fn from_reason(reason: &str) -> Self {
        match reason {
            "Running" | "Started" | "Pending" => RunState::Running,
            "Succeeded" | "Completed" => RunState::Succeeded,
            r if CANCELLED_REASONS.contains(&r) => RunState::Cancelled,
            r if r == "Failed" || r.ends_with("Timeout") => RunState::Failed,
            _ => RunState::Unknown,
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Running => write!(f, "running"),
            RunState::Succeeded => write!(f, "succeeded"),
            RunState::Failed => write!(f, "failed"),
            RunState::Cancelled => write!(f, "cancelled"),
            RunState::Unknown => write!(f, "unknown"),
        }
    }
}

/// A persisted record of one pipeline execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Object name, unique within the namespace
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub annotations: Labels,
    pub state: RunState,
    /// When the run finished; present only for terminal states
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    /// Build a record, normalising the state so that a terminal state always
    /// carries a completion timestamp and a non-terminal one never does.
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        state: RunState,
        completed_at: Option<DateTime<Utc>>,
    ) -> Self {
        let (state, completed_at) = match (state.is_terminal(), completed_at) {
            (true, Some(at)) => (state, Some(at)),
            (true, None) => (RunState::Unknown, None),
            (false, _) => (state, None),
        };
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels: Labels::new(),
            annotations: Labels::new(),
            state,
            completed_at,
        }
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Label value, ignoring blank values.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}
