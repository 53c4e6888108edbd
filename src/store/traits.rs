use std::collections::BTreeMap;

use async_trait::async_trait;

use super::error::StoreResult;
use crate::models::{Labels, RunRecord};

/// Equality-based label selector (`key=value,key=value`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: BTreeMap<String, String>,
}

impl LabelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.requirements.insert(key.into(), value.into());
        self
    }

    /// True when every requirement is present in `labels` with the exact value.
    pub fn matches(&self, labels: &Labels) -> bool {
        self.requirements
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> impl Iterator<Item = (&str, &str)> {
        self.requirements
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl std::fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered = self
            .requirements
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&rendered)
    }
}

/// Access to persisted run records.
///
/// Implementations are shared between concurrent retention tasks and must not
/// cache results across calls.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// List every run record in `namespace` whose labels satisfy `selector`.
    async fn list(&self, namespace: &str, selector: &LabelSelector) -> StoreResult<Vec<RunRecord>>;

    /// Delete a run record.
    ///
    /// Returns [`StoreError::NotFound`](super::StoreError::NotFound) when the
    /// record does not exist.
    async fn delete(&self, namespace: &str, name: &str) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_display_is_sorted() {
        let selector = LabelSelector::new().with("b", "2").with("a", "1");
        assert_eq!(selector.to_string(), "a=1,b=2");
    }

    #[test]
    fn test_selector_matches_exactly() {
        let selector = LabelSelector::new().with("repo", "app").with("origin", "push");
        let mut labels = Labels::new();
        labels.insert("repo".into(), "app".into());
        assert!(!selector.matches(&labels));

        labels.insert("origin".into(), "push".into());
        labels.insert("extra".into(), "x".into());
        assert!(selector.matches(&labels));

        labels.insert("origin".into(), "push-2".into());
        assert!(!selector.matches(&labels));
    }
}
