//! In-memory port implementations
//!
//! Both record calls so tests can assert on how the application layer
//! drives its collaborators.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::domain::{Observation, RawObservation};
use crate::ports::source::{RowSource, SourceError};
use crate::ports::storage::{StorageError, StoragePort};

/// In-memory observation store keyed by `(security_id, date)`
#[derive(Debug, Default)]
pub struct InMemoryStore {
    rows: Mutex<BTreeMap<(String, NaiveDate), Observation>>,
    insert_calls: Mutex<Vec<usize>>,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to preload observations
    pub fn with_observations(mut self, observations: Vec<Observation>) -> Self {
        let rows = self.rows.get_mut();
        for obs in observations {
            rows.insert((obs.security_id.clone(), obs.date), obs);
        }
        self
    }

    /// Make every subsequent `bulk_insert` fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Sizes of every `bulk_insert` call, in order
    pub async fn insert_calls(&self) -> Vec<usize> {
        self.insert_calls.lock().await.clone()
    }

    /// Total stored rows
    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }
}

#[async_trait]
impl StoragePort for InMemoryStore {
    async fn get_latest(&self, security_id: &str) -> Result<Option<Observation>, StorageError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .values()
            .filter(|o| o.security_id == security_id)
            .max_by_key(|o| o.date)
            .cloned())
    }

    async fn get_series(
        &self,
        security_id: &str,
        since: Option<NaiveDate>,
    ) -> Result<Vec<Observation>, StorageError> {
        let rows = self.rows.lock().await;
        // BTreeMap order gives ascending dates per security
        Ok(rows
            .values()
            .filter(|o| o.security_id == security_id)
            .filter(|o| since.map_or(true, |s| o.date > s))
            .cloned()
            .collect())
    }

    async fn bulk_insert(&self, observations: &[Observation]) -> Result<usize, StorageError> {
        self.insert_calls.lock().await.push(observations.len());
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteRejected("store is read-only".to_string()));
        }

        let mut rows = self.rows.lock().await;
        let mut written = 0;
        for obs in observations {
            let key = (obs.security_id.clone(), obs.date);
            if !rows.contains_key(&key) {
                rows.insert(key, obs.clone());
                written += 1;
            }
        }
        Ok(written)
    }
}

/// Row source serving canned rows per security
#[derive(Debug, Default)]
pub struct StaticRowSource {
    responses: HashMap<String, Result<Vec<RawObservation>, SourceError>>,
    calls: Mutex<Vec<String>>,
}

impl StaticRowSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the rows returned for a security
    pub fn with_rows(mut self, security_id: &str, rows: Vec<RawObservation>) -> Self {
        self.responses.insert(security_id.to_string(), Ok(rows));
        self
    }

    /// Builder method to make fetching a security fail
    pub fn with_failure(mut self, security_id: &str, error: SourceError) -> Self {
        self.responses.insert(security_id.to_string(), Err(error));
        self
    }

    /// Get all recorded fetches
    pub async fn get_calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl RowSource for StaticRowSource {
    async fn fetch_rows(&self, security_id: &str) -> Result<Vec<RawObservation>, SourceError> {
        self.calls.lock().await.push(security_id.to_string());
        self.responses
            .get(security_id)
            .cloned()
            .unwrap_or_else(|| Err(SourceError::NotFound(security_id.to_string())))
    }
}
