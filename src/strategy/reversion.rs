//! Reversion Backtester
//!
//! Historical hit rate of PER reverting toward its median.
//!
//! Entry: any week whose PER is at or below the entry quartile.
//! Success: within the next `horizon` weeks, the PER gets strictly closer to
//! the median than it was at entry. Scanning stops at the first such week.

use serde::{Deserialize, Serialize};

use crate::domain::Series;

/// Outcome of one horizon's backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub security_id: String,
    pub horizon_weeks: usize,
    /// successes / trials; 0 with no trials, NaN when the inputs were undefined
    pub success_rate: f64,
    pub trial_count: usize,
    pub success_count: usize,
}

impl BacktestResult {
    /// Result for a series whose median or quartile could not be computed
    pub fn undefined(security_id: &str, horizon_weeks: usize) -> Self {
        Self {
            security_id: security_id.to_string(),
            horizon_weeks,
            success_rate: f64::NAN,
            trial_count: 0,
            success_count: 0,
        }
    }
}

/// Median-reversion backtester
#[derive(Debug, Clone, Copy, Default)]
pub struct ReversionBacktester;

impl ReversionBacktester {
    pub fn new() -> Self {
        Self
    }

    /// Run the first-touch reversion backtest for one horizon.
    ///
    /// `entry_quartile` is the PER level (not the probability) at or below
    /// which a week is eligible for entry. Weeks without a PER are never
    /// entered and never count as a success.
    pub fn backtest(
        &self,
        series: &Series,
        horizon_weeks: usize,
        median_per: f64,
        entry_quartile: f64,
    ) -> BacktestResult {
        let security_id = series.security_id();
        if !median_per.is_finite() || !entry_quartile.is_finite() {
            return BacktestResult::undefined(security_id, horizon_weeks);
        }

        let pers = series.per_values();
        let last_entry = pers.len().saturating_sub(horizon_weeks);

        let mut trials = 0usize;
        let mut successes = 0usize;

        for i in 0..last_entry {
            let Some(entry) = pers[i] else { continue };
            if entry > entry_quartile {
                continue;
            }
            trials += 1;

            let initial_deviation = (entry - median_per).abs();
            let reverted = pers[i + 1..=i + horizon_weeks]
                .iter()
                .flatten()
                .any(|future| (future - median_per).abs() < initial_deviation);
            if reverted {
                successes += 1;
            }
        }

        let success_rate = if trials > 0 {
            successes as f64 / trials as f64
        } else {
            0.0
        };

        tracing::debug!(
            security_id,
            horizon_weeks,
            trials,
            successes,
            "Backtest completed. Success rate: {:.2}",
            success_rate
        );

        BacktestResult {
            security_id: security_id.to_string(),
            horizon_weeks,
            success_rate,
            trial_count: trials,
            success_count: successes,
        }
    }
}
