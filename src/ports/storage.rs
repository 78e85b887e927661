//! Storage port
//!
//! Narrow read/write contract of the observation store. Rows are keyed
//! uniquely by `(security_id, date)`.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{AnalysisError, Observation};

/// Storage error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Write rejected: {0}")]
    WriteRejected(String),

    #[error("Corrupt row for {security_id}: {reason}")]
    CorruptRow { security_id: String, reason: String },
}

impl From<StorageError> for AnalysisError {
    fn from(err: StorageError) -> Self {
        AnalysisError::PersistenceFailure(err.to_string())
    }
}

/// Observation store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoragePort: Send + Sync {
    /// Most recent stored observation of a security, by date
    async fn get_latest(&self, security_id: &str) -> Result<Option<Observation>, StorageError>;

    /// Stored observations of a security dated strictly after `since`, ascending.
    ///
    /// `None` returns the full history.
    async fn get_series(
        &self,
        security_id: &str,
        since: Option<NaiveDate>,
    ) -> Result<Vec<Observation>, StorageError>;

    /// Insert observations atomically (all or nothing). Returns rows written.
    async fn bulk_insert(&self, observations: &[Observation]) -> Result<usize, StorageError>;
}
