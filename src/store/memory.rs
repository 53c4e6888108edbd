use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};

use super::{
    error::{StoreError, StoreResult},
    traits::{LabelSelector, RunStore},
};
use crate::models::RunRecord;

/// In-memory run store using DashMap for concurrent access.
///
/// Intended for tests and local development. Supports fault injection so
/// callers can exercise listing and deletion failures.
#[derive(Default)]
pub struct MemoryRunStore {
    runs: Arc<DashMap<(String, String), RunRecord>>,
    fail_list: AtomicBool,
    fail_deletes: DashSet<String>,
    delete_delay: Option<Duration>,
    list_calls: AtomicUsize,
    delete_attempts: DashMap<String, usize>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `runs`.
    pub fn with_runs(runs: impl IntoIterator<Item = RunRecord>) -> Self {
        let store = Self::new();
        for run in runs {
            store.insert(run);
        }
        store
    }

    /// Delay every delete call, simulating a slow store.
    pub fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = Some(delay);
        self
    }

    /// Insert or replace a run record.
    pub fn insert(&self, run: RunRecord) {
        self.runs
            .insert((run.namespace.clone(), run.name.clone()), run);
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<RunRecord> {
        self.runs
            .get(&(namespace.to_string(), name.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Names of all runs in `namespace`, sorted.
    pub fn names(&self, namespace: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .runs
            .iter()
            .filter(|entry| entry.key().0 == namespace)
            .map(|entry| entry.key().1.clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Make every subsequent list call fail.
    pub fn fail_listing(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    /// Make deletion of the named run fail (in any namespace).
    pub fn fail_delete_of(&self, name: impl Into<String>) {
        self.fail_deletes.insert(name.into());
    }

    /// Number of list calls served so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of delete calls received for `name`, including failed ones.
    pub fn delete_attempts(&self, name: &str) -> usize {
        self.delete_attempts.get(name).map(|c| *c).unwrap_or(0)
    }

    /// Total number of delete calls received.
    pub fn total_delete_attempts(&self) -> usize {
        self.delete_attempts.iter().map(|entry| *entry.value()).sum()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn list(&self, namespace: &str, selector: &LabelSelector) -> StoreResult<Vec<RunRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "injected listing failure".to_string(),
            ));
        }

        let runs = self
            .runs
            .iter()
            .filter(|entry| entry.key().0 == namespace && selector.matches(&entry.value().labels))
            .map(|entry| entry.value().clone())
            .collect();

        Ok(runs)
    }

    async fn delete(&self, namespace: &str, name: &str) -> StoreResult<()> {
        *self.delete_attempts.entry(name.to_string()).or_insert(0) += 1;

        if let Some(delay) = self.delete_delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_deletes.contains(name) {
            return Err(StoreError::Unavailable(format!(
                "injected deletion failure for {name}"
            )));
        }

        match self.runs.remove(&(namespace.to_string(), name.to_string())) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound),
        }
    }
}
