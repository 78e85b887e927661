//! Per-security failure records shared by the batch reports

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::domain::AnalysisError;

/// A security skipped by a batch run, with the reason
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityFailure {
    pub security_id: String,
    pub error: AnalysisError,
}

impl SecurityFailure {
    pub fn new(security_id: impl Into<String>, error: AnalysisError) -> Self {
        Self {
            security_id: security_id.into(),
            error,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }
}

impl Serialize for SecurityFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SecurityFailure", 4)?;
        state.serialize_field("security_id", &self.security_id)?;
        state.serialize_field("kind", self.error.kind())?;
        state.serialize_field("retryable", &self.error.is_retryable())?;
        state.serialize_field("message", &self.error.to_string())?;
        state.end()
    }
}
