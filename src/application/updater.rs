//! Batch Updater
//!
//! Brings the store up to date for a list of securities:
//! 1. Skip securities whose latest stored week is already fresh
//! 2. Fetch and normalize raw rows for the rest
//! 3. Reconcile against the latest stored observation
//! 4. Persist every delta in exactly one bulk insert
//!
//! A failed write keeps the computed deltas in the report so the caller can
//! retry the write without refetching.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::application::report::SecurityFailure;
use crate::application::sync::{SyncDelta, SyncReconciler};
use crate::domain::{AnalysisError, Observation};
use crate::ports::{RowSource, StoragePort};
use crate::strategy::SeriesNormalizer;

/// Result of the single batch write
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteOutcome {
    /// No security had new observations
    Nothing,
    /// All deltas were committed
    Committed { rows: usize },
    /// The write failed; `pending` holds every delta that was part of it
    Failed {
        #[serde(skip)]
        error: AnalysisError,
        message: String,
        pending: Vec<SyncDelta>,
    },
}

impl WriteOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, WriteOutcome::Failed { .. })
    }

    /// Security ids whose deltas were lost by a failed write
    pub fn pending_security_ids(&self) -> Vec<&str> {
        match self {
            WriteOutcome::Failed { pending, .. } => {
                pending.iter().map(|d| d.security_id.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Summary of one sync run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    /// Securities whose new observations were committed
    pub updated: Vec<String>,
    /// Securities that were fresh or had nothing new at the source
    pub already_up_to_date: Vec<String>,
    /// Securities skipped because of bad or insufficient data
    pub errors: Vec<SecurityFailure>,
    /// Securities skipped because a collaborator failed; worth retrying
    pub fetch_failures: Vec<SecurityFailure>,
    pub write: WriteOutcome,
}

impl SyncReport {
    fn new() -> Self {
        Self {
            updated: Vec::new(),
            already_up_to_date: Vec::new(),
            errors: Vec::new(),
            fetch_failures: Vec::new(),
            write: WriteOutcome::Nothing,
        }
    }

    fn record_failure(&mut self, failure: SecurityFailure) {
        if failure.is_retryable() {
            self.fetch_failures.push(failure);
        } else {
            self.errors.push(failure);
        }
    }
}

enum SecurityStatus {
    Fresh,
    Delta(SyncDelta),
}

/// Coordinates row source, normalizer, reconciler and store
pub struct BatchUpdater {
    store: Arc<dyn StoragePort>,
    source: Arc<dyn RowSource>,
    normalizer: SeriesNormalizer,
    reconciler: SyncReconciler,
}

impl BatchUpdater {
    pub fn new(
        store: Arc<dyn StoragePort>,
        source: Arc<dyn RowSource>,
        normalizer: SeriesNormalizer,
    ) -> Self {
        Self {
            store,
            source,
            normalizer,
            reconciler: SyncReconciler::new(),
        }
    }

    /// Sync every security as of `today`
    pub async fn run(&self, security_ids: &[String], today: NaiveDate) -> SyncReport {
        let mut report = SyncReport::new();
        let mut deltas = Vec::new();

        for security_id in security_ids {
            match self.prepare(security_id, today).await {
                Ok(SecurityStatus::Fresh) => {
                    report.already_up_to_date.push(security_id.clone());
                }
                Ok(SecurityStatus::Delta(delta)) => {
                    tracing::info!("{}: {} new observations", security_id, delta.len());
                    deltas.push(delta);
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", security_id, e);
                    report.record_failure(SecurityFailure::new(security_id.clone(), e));
                }
            }
        }

        let delta_ids: Vec<String> = deltas.iter().map(|d| d.security_id.clone()).collect();
        report.write = self.commit(deltas).await;
        if let WriteOutcome::Committed { .. } = report.write {
            report.updated = delta_ids;
        }

        tracing::info!(
            updated = report.updated.len(),
            already_up_to_date = report.already_up_to_date.len(),
            errors = report.errors.len(),
            fetch_failures = report.fetch_failures.len(),
            "Sync completed"
        );
        report
    }

    async fn prepare(&self, security_id: &str, today: NaiveDate) -> Result<SecurityStatus, AnalysisError> {
        let last_stored = self.store.get_latest(security_id).await?;
        if self.reconciler.is_up_to_date(last_stored.as_ref(), today) {
            tracing::debug!("{} already up to date", security_id);
            return Ok(SecurityStatus::Fresh);
        }

        let rows = self
            .source
            .fetch_rows(security_id)
            .await
            .map_err(|e| e.into_analysis_error(security_id))?;
        let series = self.normalizer.normalize(&rows, security_id)?;

        let delta = self.reconciler.reconcile(&series, last_stored.as_ref());
        if delta.is_empty() {
            return Ok(SecurityStatus::Fresh);
        }
        Ok(SecurityStatus::Delta(delta))
    }

    async fn commit(&self, deltas: Vec<SyncDelta>) -> WriteOutcome {
        if deltas.is_empty() {
            return WriteOutcome::Nothing;
        }

        let batch: Vec<Observation> = deltas
            .iter()
            .flat_map(|d| d.new_observations.iter().cloned())
            .collect();

        match self.store.bulk_insert(&batch).await {
            Ok(rows) => {
                tracing::info!("Committed {} observations for {} securities", rows, deltas.len());
                WriteOutcome::Committed { rows }
            }
            Err(e) => {
                let error = AnalysisError::from(e);
                tracing::error!(
                    "Bulk insert of {} observations failed: {}",
                    batch.len(),
                    error
                );
                WriteOutcome::Failed {
                    message: error.to_string(),
                    error,
                    pending: deltas,
                }
            }
        }
    }
}
