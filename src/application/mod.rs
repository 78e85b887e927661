//! Application Layer - Batch workflows over many securities
//!
//! - `sync`: diff-based reconciliation of a series against the store
//! - `updater`: fetch -> normalize -> reconcile for a batch, one bulk write
//! - `analyzer`: summarize -> backtest -> score for a batch on a worker pool
//!
//! A single bad security never aborts a batch; it is recorded as a
//! `SecurityFailure` and the run continues.

pub mod analyzer;
pub mod report;
pub mod sync;
pub mod updater;

pub use analyzer::{BatchAnalyzer, BatchReport, SecurityAnalysis};
pub use report::SecurityFailure;
pub use sync::{SyncDelta, SyncReconciler};
pub use updater::{BatchUpdater, SyncReport, WriteOutcome};
