use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Backing store holding pipeline-run records.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Process-local store. Testing and local development only.
    #[default]
    Memory,

    /// Kubernetes API server.
    Kubernetes(KubeStoreConfig),
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            StoreConfig::Memory => Ok(()),
            StoreConfig::Kubernetes(c) => c.validate(),
        }
    }
}

/// Kubernetes API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct KubeStoreConfig {
    /// Base URL of the API server.
    /// Default: https://kubernetes.default.svc
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Bearer token. Takes precedence over `token_file`.
    #[serde(default)]
    pub token: Option<String>,

    /// File containing the bearer token, read once at startup.
    /// Default: the in-cluster service account token
    #[serde(default = "default_token_file")]
    pub token_file: Option<PathBuf>,

    /// API group of the run resource.
    #[serde(default = "default_group")]
    pub group: String,

    /// API version of the run resource.
    #[serde(default = "default_version")]
    pub version: String,

    /// Plural resource name.
    #[serde(default = "default_plural")]
    pub plural: String,

    /// Maximum number of records requested per list page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for KubeStoreConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
            token_file: default_token_file(),
            group: default_group(),
            version: default_version(),
            plural: default_plural(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl KubeStoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.api_url).map_err(|e| {
            ConfigError::Validation(format!("store.api_url '{}' is invalid: {e}", self.api_url))
        })?;
        if self.group.is_empty() || self.version.is_empty() || self.plural.is_empty() {
            return Err(ConfigError::Validation(
                "store.group, store.version and store.plural cannot be empty".into(),
            ));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Validation(
                "store.page_size must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_api_url() -> String {
    "https://kubernetes.default.svc".to_string()
}

fn default_token_file() -> Option<PathBuf> {
    Some(PathBuf::from(
        "/var/run/secrets/kubernetes.io/serviceaccount/token",
    ))
}

fn default_group() -> String {
    "tekton.dev".to_string()
}

fn default_version() -> String {
    "v1".to_string()
}

fn default_plural() -> String {
    "pipelineruns".to_string()
}

fn default_page_size() -> u32 {
    500
}

fn default_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_memory() {
        assert!(matches!(StoreConfig::default(), StoreConfig::Memory));
    }

    #[test]
    fn test_parse_kubernetes() {
        let config: StoreConfig = toml::from_str(
            r#"
            type = "kubernetes"
            api_url = "https://10.0.0.1:6443"
            token = "abc"
            page_size = 100
        "#,
        )
        .unwrap();
        let StoreConfig::Kubernetes(kube) = config else {
            panic!("expected kubernetes store");
        };
        assert_eq!(kube.api_url, "https://10.0.0.1:6443");
        assert_eq!(kube.token.as_deref(), Some("abc"));
        assert_eq!(kube.plural, "pipelineruns");
        assert_eq!(kube.page_size, 100);
        assert_eq!(kube.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let config = StoreConfig::Kubernetes(KubeStoreConfig {
            api_url: "not a url".into(),
            ..Default::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let config = StoreConfig::Kubernetes(KubeStoreConfig {
            page_size: 0,
            ..Default::default()
        });
        assert!(config.validate().is_err());
    }
}
