//! Statistics Engine
//!
//! Descriptive PER statistics over a cleaned series, plus deltas that place
//! the latest PER inside the historical range:
//!
//! delta = (latest_per - stat) / (max_per - min_per)

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::domain::{AnalysisError, Series};
use crate::strategy::params::DEFAULT_ENTRY_QUARTILE;

/// Trailing-window summary for one security
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub security_id: String,
    /// PER of the most recent observation, if present
    pub latest_per: Option<f64>,
    /// Price of the most recent observation
    pub latest_price: f64,
    pub quartile_25_per: f64,
    pub median_per: f64,
    pub mean_per: f64,
    pub min_per: f64,
    pub max_per: f64,
    pub quartile_delta: Option<f64>,
    pub median_delta: Option<f64>,
    pub mean_delta: Option<f64>,
    pub min_delta: Option<f64>,
}

/// Linear-interpolation quantile of ascending `sorted` values.
///
/// Position is `(n - 1) * p`, interpolated between the neighbouring ranks.
pub fn quantile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let h = (n - 1) as f64 * p.clamp(0.0, 1.0);
            let lo = h.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
        }
    }
}

/// Engine computing [`SummaryStatistics`]
#[derive(Debug, Clone)]
pub struct StatisticsEngine {
    entry_quartile: f64,
}

impl Default for StatisticsEngine {
    fn default() -> Self {
        Self::new(DEFAULT_ENTRY_QUARTILE)
    }
}

impl StatisticsEngine {
    pub fn new(entry_quartile: f64) -> Self {
        Self { entry_quartile }
    }

    /// Summarize the PER distribution of a series
    pub fn summarize(&self, series: &Series) -> Result<SummaryStatistics, AnalysisError> {
        let mut values: Vec<f64> = series
            .per_values()
            .into_iter()
            .flatten()
            .filter(|v| v.is_finite())
            .collect();

        let latest = match series.latest() {
            Some(latest) if !values.is_empty() => latest,
            _ => {
                return Err(AnalysisError::EmptySeries {
                    security_id: series.security_id().to_string(),
                })
            }
        };

        values.sort_by(f64::total_cmp);

        let quartile_25_per = quantile(&values, self.entry_quartile);
        let median_per = quantile(&values, 0.5);
        let mean_per = Statistics::mean(values.iter());
        let min_per = Statistics::min(values.iter());
        let max_per = Statistics::max(values.iter());

        let latest_per = latest.per_f64();
        let range = max_per - min_per;
        let delta = |stat: f64| -> Option<f64> {
            match latest_per {
                Some(per) if range != 0.0 => Some((per - stat) / range),
                _ => None,
            }
        };

        Ok(SummaryStatistics {
            security_id: series.security_id().to_string(),
            latest_per,
            latest_price: latest.price_f64(),
            quartile_25_per,
            median_per,
            mean_per,
            min_per,
            max_per,
            quartile_delta: delta(quartile_25_per),
            median_delta: delta(median_per),
            mean_delta: delta(mean_per),
            min_delta: delta(min_per),
        })
    }
}
