//! Scoring Engine
//!
//! Combines the three horizon backtests with the valuation gap into a
//! reporting ScoreCard.
//!
//! median_price = median_per / latest_per * latest_price
//! upside       = (median_price - latest_price) / latest_price
//! kelly        = (average_rate * (1 + upside) - 1) / upside
//! verdict      = upside > 0 AND average_rate > verdict_threshold

use serde::{Deserialize, Serialize};

use crate::strategy::params::DEFAULT_VERDICT_THRESHOLD;
use crate::strategy::reversion::BacktestResult;
use crate::strategy::statistics::SummaryStatistics;

/// Backtests for the 1/2/3-month horizons of one security
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonResults {
    pub one_month: BacktestResult,
    pub two_months: BacktestResult,
    pub three_months: BacktestResult,
}

impl HorizonResults {
    /// Arithmetic mean of the three rates; NaN if any rate is NaN
    pub fn average_rate(&self) -> f64 {
        (self.one_month.success_rate + self.two_months.success_rate + self.three_months.success_rate)
            / 3.0
    }
}

/// Per-security reporting record.
///
/// Flat so that it maps onto one CSV row. Undefined arithmetic is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub security_id: String,
    pub current_price: f64,
    pub median_price: Option<f64>,
    pub price_upside_pct: Option<f64>,
    pub rate_1m: f64,
    pub rate_2m: f64,
    pub rate_3m: f64,
    pub average_rate: f64,
    pub kelly_fraction: Option<f64>,
    pub verdict: bool,
    pub trials_1m: usize,
    pub trials_2m: usize,
    pub trials_3m: usize,
    pub successes_1m: usize,
    pub successes_2m: usize,
    pub successes_3m: usize,
}

/// Engine producing [`ScoreCard`]s
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    verdict_threshold: f64,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(DEFAULT_VERDICT_THRESHOLD)
    }
}

impl ScoringEngine {
    pub fn new(verdict_threshold: f64) -> Self {
        Self { verdict_threshold }
    }

    /// Score one security. Never fails; degenerate arithmetic yields `None` fields.
    pub fn score(&self, summary: &SummaryStatistics, results: &HorizonResults) -> ScoreCard {
        let current_price = summary.latest_price;

        let median_price = summary
            .latest_per
            .filter(|per| *per != 0.0)
            .map(|per| summary.median_per / per * current_price)
            .filter(|p| p.is_finite());

        let price_upside_pct = median_price
            .filter(|_| current_price != 0.0)
            .map(|mp| (mp - current_price) / current_price);

        let average_rate = results.average_rate();

        let kelly_fraction = price_upside_pct
            .filter(|upside| *upside != 0.0)
            .map(|upside| (average_rate * (1.0 + upside) - 1.0) / upside)
            .filter(|k| k.is_finite());

        // NaN average compares false
        let verdict = price_upside_pct.is_some_and(|upside| upside > 0.0)
            && average_rate > self.verdict_threshold;

        ScoreCard {
            security_id: summary.security_id.clone(),
            current_price,
            median_price,
            price_upside_pct,
            rate_1m: results.one_month.success_rate,
            rate_2m: results.two_months.success_rate,
            rate_3m: results.three_months.success_rate,
            average_rate,
            kelly_fraction,
            verdict,
            trials_1m: results.one_month.trial_count,
            trials_2m: results.two_months.trial_count,
            trials_3m: results.three_months.trial_count,
            successes_1m: results.one_month.success_count,
            successes_2m: results.two_months.success_count,
            successes_3m: results.three_months.success_count,
        }
    }
}
