//! Series Normalizer
//!
//! Turns newest-first scraped rows into an ascending, typed [`Series`].
//!
//! Row-level problems (bad date code, unparseable price) drop the row.
//! Security-level problems (missing columns, too many missing PER values,
//! out-of-order dates) fail the whole security.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::domain::{
    AnalysisError, DateCodec, Observation, RawObservation, Series, COL_DATE, COL_EPS, COL_PER,
    COL_PRICE, REQUIRED_COLUMNS,
};
use crate::strategy::params::AnalysisParams;

/// Parse scraped numeric text.
///
/// Accepts thousands separators and surrounding whitespace. Placeholders such
/// as `-` or `N/A` map to `None`, never to zero.
pub fn parse_number(text: &str) -> Option<Decimal> {
    let cleaned: String = text.trim().chars().filter(|&c| c != ',').collect();
    if cleaned.is_empty() || cleaned == "-" {
        return None;
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

/// Normalizer for raw valuation rows
#[derive(Debug, Clone)]
pub struct SeriesNormalizer {
    nan_threshold: f64,
    max_per: f64,
    max_eps: f64,
}

impl Default for SeriesNormalizer {
    fn default() -> Self {
        Self::new(&AnalysisParams::default())
    }
}

impl SeriesNormalizer {
    pub fn new(params: &AnalysisParams) -> Self {
        Self {
            nan_threshold: params.nan_threshold,
            max_per: params.max_per,
            max_eps: params.max_eps,
        }
    }

    /// Normalize newest-first rows into an ascending series
    pub fn normalize(
        &self,
        rows: &[RawObservation],
        security_id: &str,
    ) -> Result<Series, AnalysisError> {
        self.check_schema(rows, security_id)?;

        let mut observations: Vec<Observation> = rows
            .iter()
            .filter_map(|row| self.convert_row(row, security_id))
            .collect();

        // Source delivers newest first
        observations.reverse();
        let series = Series::new(security_id, observations)?;
        self.check_coverage(&series)?;

        tracing::debug!(
            security_id,
            rows = rows.len(),
            kept = series.len(),
            "Normalized series"
        );
        Ok(series)
    }

    fn check_schema(&self, rows: &[RawObservation], security_id: &str) -> Result<(), AnalysisError> {
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|col| rows.is_empty() || !rows.iter().all(|r| r.has_column(col)))
            .map(|col| col.to_string())
            .collect();

        if rows.is_empty() {
            return Err(self.insufficient(security_id, 1.0));
        }
        if !missing.is_empty() {
            return Err(AnalysisError::SchemaMismatch {
                security_id: security_id.to_string(),
                missing,
            });
        }
        Ok(())
    }

    /// Fail with `InsufficientData` when the share of missing PER exceeds the threshold.
    ///
    /// Applies to any series, including stored history and trailing windows.
    pub fn check_coverage(&self, series: &Series) -> Result<(), AnalysisError> {
        let security_id = series.security_id();
        let ratio = series.missing_per_ratio();
        if ratio > self.nan_threshold {
            tracing::warn!(
                "{}: {:.1}% of PER values missing exceeds {:.1}% threshold",
                security_id,
                ratio * 100.0,
                self.nan_threshold * 100.0
            );
            return Err(self.insufficient(security_id, ratio));
        }
        Ok(())
    }

    fn insufficient(&self, security_id: &str, ratio: f64) -> AnalysisError {
        AnalysisError::InsufficientData {
            security_id: security_id.to_string(),
            missing_pct: ratio * 100.0,
            limit_pct: self.nan_threshold * 100.0,
        }
    }

    /// Convert one raw row, or `None` when the row must be dropped
    fn convert_row(&self, row: &RawObservation, security_id: &str) -> Option<Observation> {
        let code = row.get(COL_DATE).unwrap_or_default();
        let date = match DateCodec::decode(code) {
            Ok(date) => date,
            Err(e) => {
                tracing::debug!(security_id, error = %e, "Dropping row");
                return None;
            }
        };

        let Some(price) = row.get(COL_PRICE).and_then(parse_number) else {
            tracing::debug!(security_id, %date, "Dropping row without price");
            return None;
        };

        let eps = row
            .get(COL_EPS)
            .and_then(parse_number)
            .filter(|v| within_cap(v, self.max_eps));
        let per = row
            .get(COL_PER)
            .and_then(parse_number)
            .filter(|v| within_cap(v, self.max_per));

        Some(Observation::new(security_id, date, price, eps, per))
    }
}

fn within_cap(value: &Decimal, cap: f64) -> bool {
    value.to_f64().map_or(false, |v| v <= cap)
}
