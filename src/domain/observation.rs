//! Weekly valuation observations and per-security series

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::calendar::years_before;
use super::error::AnalysisError;

/// Column holding the year-week date code
pub const COL_DATE: &str = "Date";
/// Column holding the weekly closing price
pub const COL_PRICE: &str = "Price";
/// Column holding earnings per share
pub const COL_EPS: &str = "EPS";
/// Column holding the price/earnings ratio
pub const COL_PER: &str = "PER";

/// Columns every raw row set must carry
pub const REQUIRED_COLUMNS: [&str; 4] = [COL_DATE, COL_PRICE, COL_EPS, COL_PER];

/// One untyped scraped row, keyed by column header.
///
/// Only the normalizer reads these; everything downstream works on [`Observation`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawObservation {
    fields: BTreeMap<String, String>,
}

impl RawObservation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from `(column, value)` pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Builder method to set a column value
    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.fields.insert(column.to_string(), value.to_string());
        self
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// A typed weekly observation for one security.
///
/// Identity is `(security_id, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub security_id: String,
    pub date: NaiveDate,
    pub price: Decimal,
    pub eps: Option<Decimal>,
    pub per: Option<Decimal>,
}

impl Observation {
    pub fn new(
        security_id: impl Into<String>,
        date: NaiveDate,
        price: Decimal,
        eps: Option<Decimal>,
        per: Option<Decimal>,
    ) -> Self {
        Self {
            security_id: security_id.into(),
            date,
            price,
            eps,
            per,
        }
    }

    pub fn price_f64(&self) -> f64 {
        self.price.to_f64().unwrap_or(f64::NAN)
    }

    pub fn per_f64(&self) -> Option<f64> {
        self.per.and_then(|p| p.to_f64())
    }
}

/// Observations of one security, strictly ascending by date
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    security_id: String,
    observations: Vec<Observation>,
}

impl Series {
    /// Build a series, rejecting duplicate or descending dates
    pub fn new(
        security_id: impl Into<String>,
        observations: Vec<Observation>,
    ) -> Result<Self, AnalysisError> {
        let security_id = security_id.into();
        if let Some(pair) = observations.windows(2).find(|w| w[0].date >= w[1].date) {
            return Err(AnalysisError::UnorderedDates {
                security_id,
                date: pair[1].date.to_string(),
            });
        }
        Ok(Self {
            security_id,
            observations,
        })
    }

    pub fn security_id(&self) -> &str {
        &self.security_id
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn into_observations(self) -> Vec<Observation> {
        self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Most recent observation (the last element)
    pub fn latest(&self) -> Option<&Observation> {
        self.observations.last()
    }

    /// PER values in chronological order, `None` where missing
    pub fn per_values(&self) -> Vec<Option<f64>> {
        self.observations.iter().map(Observation::per_f64).collect()
    }

    /// Share of observations without a PER value; 1.0 for an empty series
    pub fn missing_per_ratio(&self) -> f64 {
        if self.observations.is_empty() {
            return 1.0;
        }
        let missing = self.observations.iter().filter(|o| o.per.is_none()).count();
        missing as f64 / self.observations.len() as f64
    }

    /// Observations dated strictly after `date`
    pub fn after(&self, date: NaiveDate) -> &[Observation] {
        let start = self.observations.partition_point(|o| o.date <= date);
        &self.observations[start..]
    }

    /// Trailing window covering `years` calendar years back from the latest observation
    pub fn trailing_years(&self, years: u32) -> Series {
        let Some(latest) = self.latest() else {
            return self.clone();
        };
        let cutoff = years_before(latest.date, years);
        Series {
            security_id: self.security_id.clone(),
            observations: self.after(cutoff).to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn obs(date: NaiveDate, per: Option<Decimal>) -> Observation {
        Observation::new("2330", date, dec!(100), None, per)
    }

    fn weekly(start: NaiveDate, n: u64) -> Vec<Observation> {
        (0..n)
            .map(|i| obs(start + chrono::Days::new(7 * i), Some(dec!(15))))
            .collect()
    }

    #[test]
    fn test_series_rejects_duplicate_dates() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let result = Series::new("2330", vec![obs(date, None), obs(date, None)]);
        assert!(matches!(result, Err(AnalysisError::UnorderedDates { .. })));
    }

    #[test]
    fn test_latest_is_last_element() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let series = Series::new("2330", weekly(start, 3)).unwrap();
        assert_eq!(series.latest().unwrap().date, NaiveDate::from_ymd_opt(2024, 1, 19).unwrap());
    }

    #[test]
    fn test_after_is_strict() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let series = Series::new("2330", weekly(start, 4)).unwrap();
        let after = series.after(NaiveDate::from_ymd_opt(2024, 1, 12).unwrap());
        assert_eq!(after.len(), 2);
        assert_eq!(after[0].date, NaiveDate::from_ymd_opt(2024, 1, 19).unwrap());
    }

    #[test]
    fn test_trailing_years_window() {
        let start = NaiveDate::from_ymd_opt(2015, 1, 2).unwrap();
        let series = Series::new("2330", weekly(start, 52 * 10)).unwrap();
        let window = series.trailing_years(5);
        let cutoff = years_before(series.latest().unwrap().date, 5);
        assert!(window.observations().iter().all(|o| o.date > cutoff));
        assert!(window.len() >= 260 && window.len() <= 261);
        assert_eq!(window.latest(), series.latest());
    }

    #[test]
    fn test_missing_per_ratio() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let mut observations = weekly(start, 10);
        for o in observations.iter_mut().take(3) {
            o.per = None;
        }
        let series = Series::new("2330", observations).unwrap();
        assert!((series.missing_per_ratio() - 0.3).abs() < 1e-12);

        let empty = Series::new("2330", Vec::new()).unwrap();
        assert_eq!(empty.missing_per_ratio(), 1.0);
    }

    #[test]
    fn test_raw_observation_lookup() {
        let row = RawObservation::new().with(COL_DATE, "24W01").with(COL_PER, "12.5");
        assert_eq!(row.get(COL_PER), Some("12.5"));
        assert!(!row.has_column(COL_EPS));
    }
}
