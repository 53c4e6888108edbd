//! Run store backed by the Kubernetes REST API.
//!
//! Run records are custom resources (Tekton `PipelineRun` by default). Only
//! the fields retention needs are decoded: metadata, the `Succeeded`
//! condition and the completion time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use url::Url;

use super::{
    error::{StoreError, StoreResult},
    traits::{LabelSelector, RunStore},
};
use crate::{
    config::KubeStoreConfig,
    models::{Labels, RunRecord, RunState},
};

/// Condition type carrying the lifecycle of a run.
const SUCCEEDED_CONDITION: &str = "Succeeded";

pub struct KubeRunStore {
    client: Client,
    base_url: Url,
    token: Option<String>,
    config: KubeStoreConfig,
}

impl KubeRunStore {
    /// Build a store from configuration, reading the token file if no inline
    /// token is configured.
    ///
    /// A missing token file is not an error: the store then talks to the API
    /// server unauthenticated (e.g. through `kubectl proxy`).
    pub async fn from_config(config: &KubeStoreConfig) -> StoreResult<Self> {
        let token = match (&config.token, &config.token_file) {
            (Some(token), _) => Some(token.clone()),
            (None, Some(path)) => match tokio::fs::read_to_string(path).await {
                Ok(contents) => Some(contents.trim().to_string()).filter(|t| !t.is_empty()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(
                        path = %path.display(),
                        "Token file not found, using unauthenticated requests"
                    );
                    None
                }
                Err(e) => {
                    return Err(StoreError::Config(format!(
                        "failed to read token file {}: {e}",
                        path.display()
                    )));
                }
            },
            (None, None) => None,
        };

        Self::new(config.clone(), token)
    }

    pub fn new(config: KubeStoreConfig, token: Option<String>) -> StoreResult<Self> {
        let base_url = Url::parse(&config.api_url)
            .map_err(|e| StoreError::Config(format!("invalid api_url '{}': {e}", config.api_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Config(format!(
                "api_url '{}' cannot be used as a base URL",
                config.api_url
            )));
        }

        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            base_url,
            token,
            config,
        })
    }

    /// `{api_url}/apis/{group}/{version}/namespaces/{namespace}/{plural}[/{name}]`
    fn resource_url(&self, namespace: &str, name: Option<&str>) -> StoreResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StoreError::Config("api_url cannot be a base URL".to_string()))?;
            segments.pop_if_empty().extend([
                "apis",
                self.config.group.as_str(),
                self.config.version.as_str(),
                "namespaces",
                namespace,
                self.config.plural.as_str(),
            ]);
            if let Some(name) = name {
                segments.push(name);
            }
        }
        Ok(url)
    }

    fn map_transport(&self, error: reqwest::Error) -> StoreError {
        if error.is_timeout() {
            StoreError::Timeout(self.config.timeout())
        } else {
            StoreError::Http(error)
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl RunStore for KubeRunStore {
    async fn list(&self, namespace: &str, selector: &LabelSelector) -> StoreResult<Vec<RunRecord>> {
        let url = self.resource_url(namespace, None)?;
        let selector = selector.to_string();
        let limit = self.config.page_size.to_string();

        let mut runs = Vec::new();
        let mut continue_token: Option<String> = None;

        loop {
            let mut query = vec![("labelSelector", selector.as_str()), ("limit", limit.as_str())];
            if let Some(token) = continue_token.as_deref() {
                query.push(("continue", token));
            }

            let request = self.authorize(self.client.get(url.clone()).query(&query));
            let response = request.send().await.map_err(|e| self.map_transport(e))?;
            let response = check_status(response).await?;
            let page: RunList = response
                .json()
                .await
                .map_err(|e| StoreError::Decode(e.to_string()))?;

            runs.extend(
                page.items
                    .into_iter()
                    .map(|object| object.into_record(namespace)),
            );

            continue_token = page
                .metadata
                .continue_token
                .filter(|token| !token.is_empty());
            if continue_token.is_none() {
                break;
            }
            tracing::trace!(fetched = runs.len(), "Following list continue token");
        }

        Ok(runs)
    }

    async fn delete(&self, namespace: &str, name: &str) -> StoreResult<()> {
        let url = self.resource_url(namespace, Some(name))?;
        let request = self.authorize(self.client.delete(url));
        let response = request.send().await.map_err(|e| self.map_transport(e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound);
        }
        check_status(response).await?;
        Ok(())
    }
}

/// Turn a non-success response into [`StoreError::Rejected`], using the
/// API server's `Status.message` when present.
async fn check_status(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiStatus>(&body)
        .ok()
        .and_then(|s| s.message)
        .unwrap_or(body);

    Err(StoreError::Rejected {
        status: status.as_u16(),
        message,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunList {
    #[serde(default)]
    items: Vec<RunObject>,
    #[serde(default)]
    metadata: ListMeta,
}

#[derive(Debug, Default, Deserialize)]
struct ListMeta {
    #[serde(default, rename = "continue")]
    continue_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    metadata: ObjectMeta,
    #[serde(default)]
    status: Option<RunStatus>,
}

#[derive(Debug, Deserialize)]
struct ObjectMeta {
    name: String,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    labels: Option<Labels>,
    #[serde(default)]
    annotations: Option<Labels>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunStatus {
    #[serde(default)]
    completion_time: Option<DateTime<Utc>>,
    #[serde(default)]
    conditions: Option<Vec<Condition>>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

impl RunObject {
    fn into_record(self, requested_namespace: &str) -> RunRecord {
        let (state, completed_at) = match &self.status {
            Some(status) => {
                let condition = status
                    .conditions
                    .iter()
                    .flatten()
                    .find(|c| c.kind == SUCCEEDED_CONDITION);
                let state = match condition {
                    Some(c) => RunState::from_condition(c.status.as_deref(), c.reason.as_deref()),
                    None => RunState::Unknown,
                };
                (state, status.completion_time)
            }
            None => (RunState::Unknown, None),
        };

        let meta = self.metadata;
        let namespace = meta
            .namespace
            .unwrap_or_else(|| requested_namespace.to_string());

        let mut record = RunRecord::new(meta.name, namespace, state, completed_at)
            .with_labels(meta.labels.unwrap_or_default());
        record.annotations = meta.annotations.unwrap_or_default();
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(api_url: &str) -> KubeRunStore {
        KubeRunStore::new(
            KubeStoreConfig {
                api_url: api_url.to_string(),
                token_file: None,
                ..Default::default()
            },
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_resource_url() {
        let store = store("https://api.example.com:6443");
        assert_eq!(
            store.resource_url("ci", None).unwrap().as_str(),
            "https://api.example.com:6443/apis/tekton.dev/v1/namespaces/ci/pipelineruns"
        );
        assert_eq!(
            store.resource_url("ci", Some("run-1")).unwrap().as_str(),
            "https://api.example.com:6443/apis/tekton.dev/v1/namespaces/ci/pipelineruns/run-1"
        );
    }

    #[test]
    fn test_resource_url_keeps_base_path() {
        let store = store("http://127.0.0.1:8001/proxy/");
        assert_eq!(
            store.resource_url("ci", None).unwrap().as_str(),
            "http://127.0.0.1:8001/proxy/apis/tekton.dev/v1/namespaces/ci/pipelineruns"
        );
    }

    #[test]
    fn test_decode_run_object() {
        let object: RunObject = serde_json::from_value(serde_json::json!({
            "metadata": {
                "name": "app-push-x7f2k",
                "namespace": "ci",
                "labels": {"pipelinesascode.tekton.dev/repository": "app"},
                "annotations": {"pipelinesascode.tekton.dev/max-keep-runs": "3"}
            },
            "status": {
                "completionTime": "2025-03-01T10:00:00Z",
                "conditions": [
                    {"type": "Succeeded", "status": "False", "reason": "PipelineRunCancelled"}
                ]
            }
        }))
        .unwrap();

        let record = object.into_record("ci");
        assert_eq!(record.name, "app-push-x7f2k");
        assert_eq!(record.state, RunState::Cancelled);
        assert!(record.completed_at.is_some());
        assert_eq!(
            record.annotation("pipelinesascode.tekton.dev/max-keep-runs"),
            Some("3")
        );
    }

    #[test]
    fn test_decode_run_without_status() {
        let object: RunObject =
            serde_json::from_value(serde_json::json!({"metadata": {"name": "fresh"}})).unwrap();
        let record = object.into_record("ci");
        assert_eq!(record.namespace, "ci");
        assert_eq!(record.state, RunState::Unknown);
        assert!(record.labels.is_empty());
    }

    #[test]
    fn test_decode_running_run() {
        let object: RunObject = serde_json::from_value(serde_json::json!({
            "metadata": {"name": "busy", "labels": null},
            "status": {
                "conditions": [{"type": "Succeeded", "status": "Unknown", "reason": "Running"}]
            }
        }))
        .unwrap();
        let record = object.into_record("ci");
        assert_eq!(record.state, RunState::Running);
        assert!(record.completed_at.is_none());
    }
}
