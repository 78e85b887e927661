//! Analysis Parameters
//!
//! Fixed policy constants of the median-reversion screen, exposed as named
//! parameters so tests and config files can vary them.

use serde::{Deserialize, Serialize};

/// Maximum share of rows allowed to miss a PER value
pub const DEFAULT_NAN_THRESHOLD: f64 = 0.2;
/// Percentile below which an observation is cheap enough to trial
pub const DEFAULT_ENTRY_QUARTILE: f64 = 0.25;
/// Average success rate required for a positive verdict
pub const DEFAULT_VERDICT_THRESHOLD: f64 = 0.84;
/// Trailing history used for statistics, in years
pub const DEFAULT_LOOKBACK_YEARS: u32 = 5;
/// PER values above this are scraping artifacts
pub const DEFAULT_MAX_PER: f64 = 1_000_000.0;
/// EPS values above this are scraping artifacts
pub const DEFAULT_MAX_EPS: f64 = 1_000_000.0;

/// Lookahead horizons in weekly observations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Horizons {
    pub one_month: usize,
    pub two_months: usize,
    pub three_months: usize,
}

impl Default for Horizons {
    fn default() -> Self {
        Self {
            one_month: 4,
            two_months: 8,
            three_months: 12,
        }
    }
}

impl Horizons {
    pub fn as_array(&self) -> [usize; 3] {
        [self.one_month, self.two_months, self.three_months]
    }
}

/// Main analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisParams {
    /// Maximum fraction of rows with missing PER (exclusive)
    pub nan_threshold: f64,
    /// Entry percentile for trial selection (0.25 = first quartile)
    pub entry_quartile: f64,
    /// Average reversion rate needed for a positive verdict
    pub verdict_threshold: f64,
    /// Backtest horizons
    pub horizons: Horizons,
    /// Trailing years of history to analyse (`None` = full history)
    pub lookback_years: Option<u32>,
    /// PER sanity cap; larger values are treated as missing
    pub max_per: f64,
    /// EPS sanity cap; larger values are treated as missing
    pub max_eps: f64,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            nan_threshold: DEFAULT_NAN_THRESHOLD,
            entry_quartile: DEFAULT_ENTRY_QUARTILE,
            verdict_threshold: DEFAULT_VERDICT_THRESHOLD,
            horizons: Horizons::default(),
            lookback_years: Some(DEFAULT_LOOKBACK_YEARS),
            max_per: DEFAULT_MAX_PER,
            max_eps: DEFAULT_MAX_EPS,
        }
    }
}

impl AnalysisParams {
    /// Create a new config with a custom verdict threshold
    pub fn with_verdict_threshold(mut self, threshold: f64) -> Self {
        self.verdict_threshold = threshold;
        self
    }

    /// Create a new config with a custom lookback window
    pub fn with_lookback_years(mut self, years: Option<u32>) -> Self {
        self.lookback_years = years;
        self
    }

    /// Create a new config with custom horizons
    pub fn with_horizons(mut self, horizons: Horizons) -> Self {
        self.horizons = horizons;
        self
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ParamsError> {
        if !(0.0..1.0).contains(&self.nan_threshold) {
            return Err(ParamsError::InvalidNanThreshold(self.nan_threshold));
        }
        if self.entry_quartile <= 0.0 || self.entry_quartile >= 1.0 {
            return Err(ParamsError::InvalidEntryQuartile(self.entry_quartile));
        }
        if self.verdict_threshold <= 0.0 || self.verdict_threshold > 1.0 {
            return Err(ParamsError::InvalidVerdictThreshold(self.verdict_threshold));
        }
        if self.horizons.as_array().iter().any(|&h| h == 0) {
            return Err(ParamsError::InvalidHorizon);
        }
        if self.lookback_years == Some(0) {
            return Err(ParamsError::InvalidLookback);
        }
        if self.max_per <= 0.0 || self.max_eps <= 0.0 {
            return Err(ParamsError::InvalidSanityCap);
        }
        Ok(())
    }
}

/// Parameter validation errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParamsError {
    #[error("Invalid NaN threshold: {0} (must be 0 <= t < 1)")]
    InvalidNanThreshold(f64),
    #[error("Invalid entry quartile: {0} (must be 0 < q < 1)")]
    InvalidEntryQuartile(f64),
    #[error("Invalid verdict threshold: {0} (must be 0 < t <= 1)")]
    InvalidVerdictThreshold(f64),
    #[error("Horizons must be at least one week")]
    InvalidHorizon,
    #[error("Lookback must be at least one year")]
    InvalidLookback,
    #[error("PER/EPS sanity caps must be positive")]
    InvalidSanityCap,
}
