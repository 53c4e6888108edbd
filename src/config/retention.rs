//! Run retention configuration.
//!
//! Controls how many completed pipeline runs are kept per repository and
//! originating run, and how run records are grouped.
//!
//! # Example
//!
//! ```toml
//! [retention]
//! enabled = true
//! default_max_keep = 5
//! max_max_keep = 20
//! unknown_runs = "protect"
//! dry_run = false
//! call_timeout_secs = 30
//!
//! [retention.labels]
//! repository = "pipelinesascode.tekton.dev/repository"
//! original_run = "pipelinesascode.tekton.dev/original-prname"
//! max_keep_annotation = "pipelinesascode.tekton.dev/max-keep-runs"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Run retention configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Whether retention is enforced after runs complete.
    /// Default: true
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Number of runs to keep when the triggering run carries no
    /// max-keep annotation. Unset means such runs are not cleaned up.
    #[serde(default)]
    pub default_max_keep: Option<u32>,

    /// Upper bound applied to any requested max-keep value.
    /// Unset means no ceiling.
    #[serde(default)]
    pub max_max_keep: Option<u32>,

    /// How runs without a usable status are treated.
    /// Default: protect
    #[serde(default)]
    pub unknown_runs: UnknownRunPolicy,

    /// If true, log what would be deleted without deleting anything.
    /// Default: false
    #[serde(default)]
    pub dry_run: bool,

    /// Timeout applied to each individual list or delete call, in seconds.
    /// Default: 30
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Label and annotation keys used to group runs.
    #[serde(default)]
    pub labels: RetentionLabels,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_max_keep: None,
            max_max_keep: None,
            unknown_runs: UnknownRunPolicy::default(),
            dry_run: false,
            call_timeout_secs: default_call_timeout_secs(),
            labels: RetentionLabels::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_call_timeout_secs() -> u64 {
    30
}

/// Treatment of runs whose lifecycle state could not be determined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum UnknownRunPolicy {
    /// Never delete them; they consume retention budget like running runs.
    #[default]
    Protect,
    /// Treat them as the oldest completed runs.
    Delete,
}

/// Label and annotation keys read from run records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RetentionLabels {
    /// Label carrying the repository name.
    #[serde(default = "default_repository_label")]
    pub repository: String,

    /// Label carrying the name of the pipeline definition the run was
    /// generated from.
    #[serde(default = "default_original_run_label")]
    pub original_run: String,

    /// Annotation overriding the number of runs to keep.
    #[serde(default = "default_max_keep_annotation")]
    pub max_keep_annotation: String,
}

impl Default for RetentionLabels {
    fn default() -> Self {
        Self {
            repository: default_repository_label(),
            original_run: default_original_run_label(),
            max_keep_annotation: default_max_keep_annotation(),
        }
    }
}

fn default_repository_label() -> String {
    "pipelinesascode.tekton.dev/repository".to_string()
}

fn default_original_run_label() -> String {
    "pipelinesascode.tekton.dev/original-prname".to_string()
}

fn default_max_keep_annotation() -> String {
    "pipelinesascode.tekton.dev/max-keep-runs".to_string()
}

impl RetentionConfig {
    /// Get the per-call timeout as a Duration.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.call_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "retention.call_timeout_secs must be greater than 0".into(),
            ));
        }

        let labels = &self.labels;
        if labels.repository.trim().is_empty()
            || labels.original_run.trim().is_empty()
            || labels.max_keep_annotation.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "retention.labels keys cannot be empty".into(),
            ));
        }
        if labels.repository == labels.original_run {
            return Err(ConfigError::Validation(format!(
                "retention.labels.repository and retention.labels.original_run must differ \
                 (both are '{}')",
                labels.repository
            )));
        }

        if let (Some(default), Some(ceiling)) = (self.default_max_keep, self.max_max_keep)
            && default > ceiling
        {
            return Err(ConfigError::Validation(format!(
                "retention.default_max_keep ({default}) exceeds retention.max_max_keep ({ceiling})"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RetentionConfig::default();
        assert!(config.enabled);
        assert_eq!(config.default_max_keep, None);
        assert_eq!(config.max_max_keep, None);
        assert_eq!(config.unknown_runs, UnknownRunPolicy::Protect);
        assert!(!config.dry_run);
        assert_eq!(config.call_timeout(), Duration::from_secs(30));
        assert_eq!(
            config.labels.repository,
            "pipelinesascode.tekton.dev/repository"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: RetentionConfig = toml::from_str("default_max_keep = 3").unwrap();
        assert!(config.enabled);
        assert_eq!(config.default_max_keep, Some(3));
        assert_eq!(config.labels, RetentionLabels::default());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            enabled = false
            default_max_keep = 2
            max_max_keep = 10
            unknown_runs = "delete"
            dry_run = true
            call_timeout_secs = 5

            [labels]
            repository = "example.com/repo"
            original_run = "example.com/origin"
            max_keep_annotation = "example.com/keep"
        "#;
        let config: RetentionConfig = toml::from_str(toml).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.default_max_keep, Some(2));
        assert_eq!(config.max_max_keep, Some(10));
        assert_eq!(config.unknown_runs, UnknownRunPolicy::Delete);
        assert!(config.dry_run);
        assert_eq!(config.call_timeout(), Duration::from_secs(5));
        assert_eq!(config.labels.original_run, "example.com/origin");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<RetentionConfig, _> = toml::from_str("max_keep = 3");
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = RetentionConfig {
            call_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_label_keys_rejected() {
        let mut config = RetentionConfig::default();
        config.labels.original_run = config.labels.repository.clone();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn test_default_above_ceiling_rejected() {
        let config = RetentionConfig {
            default_max_keep: Some(30),
            max_max_keep: Some(20),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
