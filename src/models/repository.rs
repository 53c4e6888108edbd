use serde::{Deserialize, Serialize};

/// Maximum length of a label value accepted by the resource store.
pub const MAX_LABEL_VALUE_LEN: usize = 63;

/// The repository a set of runs belongs to, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub namespace: String,
    pub name: String,
}

impl RepositoryRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// The repository name as it appears in run labels.
    pub fn label_value(&self) -> String {
        clean_label_value(&self.name)
    }
}

impl std::fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Normalise an arbitrary string into a valid label value.
///
/// Characters outside `[A-Za-z0-9._-]` become `-`, the value must start and
/// end with an alphanumeric and is at most 63 characters long.
pub fn clean_label_value(value: &str) -> String {
    let replaced: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();

    let trimmed = trim_non_alphanumeric(&replaced);
    let truncated = &trimmed[..trimmed.len().min(MAX_LABEL_VALUE_LEN)];
    trim_non_alphanumeric(truncated).to_string()
}

fn trim_non_alphanumeric(value: &str) -> &str {
    value.trim_matches(|c: char| !c.is_ascii_alphanumeric())
}
