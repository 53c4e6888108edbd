//! Access to persisted pipeline-run records.
//!
//! Retention talks to the store only through the [`RunStore`] trait, which is
//! injected by the caller. Two backends are provided:
//!
//! - [`MemoryRunStore`]: process-local, for tests and local development
//! - [`KubeRunStore`]: the Kubernetes REST API

mod error;
mod kube;
mod memory;
mod traits;

use std::sync::Arc;

pub use error::{StoreError, StoreResult};
pub use kube::KubeRunStore;
pub use memory::MemoryRunStore;
pub use traits::{LabelSelector, RunStore};

use crate::config::StoreConfig;

/// Create a run store from configuration.
pub async fn create_store(config: &StoreConfig) -> StoreResult<Arc<dyn RunStore>> {
    let store: Arc<dyn RunStore> = match config {
        StoreConfig::Memory => {
            tracing::warn!("Using in-memory run store; run records are not persisted");
            Arc::new(MemoryRunStore::new())
        }
        StoreConfig::Kubernetes(kube) => Arc::new(KubeRunStore::from_config(kube).await?),
    };

    Ok(store)
}
