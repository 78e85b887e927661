//! Row source port
//!
//! Delivers the raw scraped rows of one security, newest first.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{AnalysisError, RawObservation};

/// Row source error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("No rows available for {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Malformed source data: {0}")]
    Malformed(String),
}

impl SourceError {
    /// Map into the per-security error taxonomy
    pub fn into_analysis_error(self, security_id: &str) -> AnalysisError {
        AnalysisError::SourceUnavailable {
            security_id: security_id.to_string(),
            reason: self.to_string(),
        }
    }
}

/// Source of raw valuation rows
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Fetch all rows for a security, newest observation first
    async fn fetch_rows(&self, security_id: &str) -> Result<Vec<RawObservation>, SourceError>;
}
