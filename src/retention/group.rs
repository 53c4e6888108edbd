use crate::{
    config::RetentionLabels,
    models::{RepositoryRef, RunRecord},
    retention::error::{RetentionError, RetentionResult},
    store::LabelSelector,
};

/// The scope within which runs compete for the same retention budget.
///
/// Built once from the triggering run; every field is validated and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupKey {
    namespace: String,
    repository: String,
    original_run: String,
    repository_label: String,
    original_run_label: String,
}

impl GroupKey {
    /// Derive the group key from the triggering run's labels.
    ///
    /// Fails when either grouping label is missing, when the repository label
    /// names a different repository than `repository`, or when the run lives
    /// in another namespace.
    pub fn resolve(
        repository: &RepositoryRef,
        triggering: &RunRecord,
        labels: &RetentionLabels,
    ) -> RetentionResult<Self> {
        let namespace = repository.namespace.trim();
        if namespace.is_empty() {
            return Err(RetentionError::InvalidGroupKey(format!(
                "repository {repository} has no namespace"
            )));
        }

        let repository_value = triggering.label(&labels.repository).ok_or_else(|| {
            RetentionError::InvalidGroupKey(format!(
                "run '{}' is missing the '{}' label",
                triggering.name, labels.repository
            ))
        })?;
        let original_run = triggering.label(&labels.original_run).ok_or_else(|| {
            RetentionError::InvalidGroupKey(format!(
                "run '{}' is missing the '{}' label",
                triggering.name, labels.original_run
            ))
        })?;

        let expected = repository.label_value();
        if repository_value != expected {
            return Err(RetentionError::InvalidGroupKey(format!(
                "run '{}' belongs to repository '{repository_value}', not '{expected}'",
                triggering.name
            )));
        }

        if !triggering.namespace.is_empty() && triggering.namespace != namespace {
            return Err(RetentionError::InvalidGroupKey(format!(
                "run '{}' is in namespace '{}', not '{namespace}'",
                triggering.name, triggering.namespace
            )));
        }

        Ok(Self {
            namespace: namespace.to_string(),
            repository: repository_value.to_string(),
            original_run: original_run.to_string(),
            repository_label: labels.repository.clone(),
            original_run_label: labels.original_run.clone(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn original_run(&self) -> &str {
        &self.original_run
    }

    /// Label selector matching every run in this group.
    pub fn selector(&self) -> LabelSelector {
        LabelSelector::new()
            .with(&self.repository_label, &self.repository)
            .with(&self.original_run_label, &self.original_run)
    }

    /// Whether `run` belongs to this group.
    pub fn contains(&self, run: &RunRecord) -> bool {
        run.namespace == self.namespace && self.selector().matches(&run.labels)
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.namespace, self.repository, self.original_run
        )
    }
}
