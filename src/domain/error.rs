//! Error taxonomy for the valuation pipeline
//!
//! Row-level errors (`InvalidDateCode`) are recovered by dropping the row.
//! Security-level errors skip one security and let the batch continue.
//! `PersistenceFailure` is reported as a failed batch write.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    /// Year-week code could not be decoded into a Friday date
    #[error("Invalid date code: '{0}'")]
    InvalidDateCode(String),

    /// Raw rows are missing one or more required columns
    #[error("Schema mismatch for {security_id}: missing columns {missing:?}")]
    SchemaMismatch {
        security_id: String,
        missing: Vec<String>,
    },

    /// Too many rows without a usable PER value
    #[error("Insufficient data for {security_id}: {missing_pct:.1}% of PER values missing (limit {limit_pct:.1}%)")]
    InsufficientData {
        security_id: String,
        missing_pct: f64,
        limit_pct: f64,
    },

    /// No PER values left to compute statistics from
    #[error("Empty series for {security_id}: no PER observations")]
    EmptySeries { security_id: String },

    /// Decoded dates are not strictly increasing after reversing the source order
    #[error("Dates out of order for {security_id} at {date}")]
    UnorderedDates { security_id: String, date: String },

    /// Row source could not deliver rows for the security
    #[error("Source unavailable for {security_id}: {reason}")]
    SourceUnavailable { security_id: String, reason: String },

    /// Storage collaborator rejected a read or the batch write
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
}

impl AnalysisError {
    /// Errors caused by the content of a security's data.
    ///
    /// Retrying these without new source data gives the same result.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            AnalysisError::InvalidDateCode(_)
                | AnalysisError::SchemaMismatch { .. }
                | AnalysisError::InsufficientData { .. }
                | AnalysisError::EmptySeries { .. }
                | AnalysisError::UnorderedDates { .. }
        )
    }

    /// Errors caused by a collaborator (fetch or storage) that may succeed on retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalysisError::SourceUnavailable { .. } | AnalysisError::PersistenceFailure(_)
        )
    }

    /// Short machine-readable kind, used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::InvalidDateCode(_) => "invalid_date_code",
            AnalysisError::SchemaMismatch { .. } => "schema_mismatch",
            AnalysisError::InsufficientData { .. } => "insufficient_data",
            AnalysisError::EmptySeries { .. } => "empty_series",
            AnalysisError::UnorderedDates { .. } => "unordered_dates",
            AnalysisError::SourceUnavailable { .. } => "source_unavailable",
            AnalysisError::PersistenceFailure(_) => "persistence_failure",
        }
    }
}
