//! Batch Analyzer
//!
//! Loads a series per security (from raw rows or from the store), then runs
//! summarize -> backtest x3 -> score for each one on a bounded rayon pool.
//! Workers share nothing mutable; output keeps the input order.

use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use crate::application::report::SecurityFailure;
use crate::domain::{years_before, AnalysisError, Series};
use crate::ports::{RowSource, StoragePort};
use crate::strategy::{
    AnalysisParams, HorizonResults, ReversionBacktester, ScoreCard, ScoringEngine,
    SeriesNormalizer, StatisticsEngine, SummaryStatistics,
};

/// Full analysis of one security
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityAnalysis {
    pub summary: SummaryStatistics,
    pub card: ScoreCard,
}

/// Outcome of one analysis run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub cards: Vec<ScoreCard>,
    pub summaries: Vec<SummaryStatistics>,
    pub errors: Vec<SecurityFailure>,
}

impl BatchReport {
    /// Cards with a positive verdict
    pub fn candidates(&self) -> impl Iterator<Item = &ScoreCard> {
        self.cards.iter().filter(|c| c.verdict)
    }
}

/// Per-security pipeline runner
pub struct BatchAnalyzer {
    params: AnalysisParams,
    normalizer: SeriesNormalizer,
    statistics: StatisticsEngine,
    backtester: ReversionBacktester,
    scoring: ScoringEngine,
    pool: Option<rayon::ThreadPool>,
}

impl BatchAnalyzer {
    /// Create an analyzer; `workers` bounds the scoring pool (global pool when `None`)
    pub fn new(params: AnalysisParams, workers: Option<usize>) -> Self {
        let pool = workers.filter(|&n| n > 0).and_then(|n| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .thread_name(|i| format!("per-reversion-{i}"))
                .build()
                .map_err(|e| tracing::warn!("Falling back to global rayon pool: {}", e))
                .ok()
        });

        Self {
            normalizer: SeriesNormalizer::new(&params),
            statistics: StatisticsEngine::new(params.entry_quartile),
            backtester: ReversionBacktester::new(),
            scoring: ScoringEngine::new(params.verdict_threshold),
            params,
            pool,
        }
    }

    pub fn params(&self) -> &AnalysisParams {
        &self.params
    }

    /// Analyse one normalized series over the trailing lookback window
    pub fn analyze_series(&self, series: &Series) -> Result<SecurityAnalysis, AnalysisError> {
        let window = match self.params.lookback_years {
            Some(years) => series.trailing_years(years),
            None => series.clone(),
        };
        self.normalizer.check_coverage(&window)?;

        let summary = self.statistics.summarize(&window)?;
        let [one, two, three] = self.params.horizons.as_array();
        let run = |horizon| {
            self.backtester
                .backtest(&window, horizon, summary.median_per, summary.quartile_25_per)
        };
        let results = HorizonResults {
            one_month: run(one),
            two_months: run(two),
            three_months: run(three),
        };

        let card = self.scoring.score(&summary, &results);
        tracing::info!(
            "{}: avg rate {:.3}, upside {:?}, verdict {}",
            card.security_id,
            card.average_rate,
            card.price_upside_pct,
            card.verdict
        );
        Ok(SecurityAnalysis { summary, card })
    }

    /// Fetch raw rows and normalize them, one security at a time
    pub async fn load_from_source(
        &self,
        source: Arc<dyn RowSource>,
        security_ids: &[String],
    ) -> Vec<(String, Result<Series, AnalysisError>)> {
        let mut loaded = Vec::with_capacity(security_ids.len());
        for security_id in security_ids {
            let series = match source.fetch_rows(security_id).await {
                Ok(rows) => self.normalizer.normalize(&rows, security_id),
                Err(e) => Err(e.into_analysis_error(security_id)),
            };
            loaded.push((security_id.clone(), series));
        }
        loaded
    }

    /// Read stored history, limited to the lookback window
    pub async fn load_from_store(
        &self,
        store: Arc<dyn StoragePort>,
        security_ids: &[String],
    ) -> Vec<(String, Result<Series, AnalysisError>)> {
        let mut loaded = Vec::with_capacity(security_ids.len());
        for security_id in security_ids {
            let series = self.read_stored(store.as_ref(), security_id).await;
            loaded.push((security_id.clone(), series));
        }
        loaded
    }

    async fn read_stored(
        &self,
        store: &dyn StoragePort,
        security_id: &str,
    ) -> Result<Series, AnalysisError> {
        let Some(latest) = store.get_latest(security_id).await? else {
            return Err(AnalysisError::EmptySeries {
                security_id: security_id.to_string(),
            });
        };
        let since = self
            .params
            .lookback_years
            .map(|years| years_before(latest.date, years));
        let observations = store.get_series(security_id, since).await?;
        Series::new(security_id, observations)
    }

    /// Score loaded series on the worker pool
    pub fn score_all(&self, loaded: Vec<(String, Result<Series, AnalysisError>)>) -> BatchReport {
        let analyse = || -> Vec<(String, Result<SecurityAnalysis, AnalysisError>)> {
            loaded
                .into_par_iter()
                .map(|(security_id, series)| {
                    let outcome = series.and_then(|s| self.analyze_series(&s));
                    (security_id, outcome)
                })
                .collect()
        };
        let outcomes = match &self.pool {
            Some(pool) => pool.install(analyse),
            None => analyse(),
        };

        let mut report = BatchReport::default();
        for (security_id, outcome) in outcomes {
            match outcome {
                Ok(analysis) => {
                    report.summaries.push(analysis.summary);
                    report.cards.push(analysis.card);
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", security_id, e);
                    report.errors.push(SecurityFailure::new(security_id, e));
                }
            }
        }

        tracing::info!(
            scored = report.cards.len(),
            candidates = report.candidates().count(),
            errors = report.errors.len(),
            "Analysis completed"
        );
        report
    }

    /// Load from the row source and score
    pub async fn run_from_source(
        &self,
        source: Arc<dyn RowSource>,
        security_ids: &[String],
    ) -> BatchReport {
        let loaded = self.load_from_source(source, security_ids).await;
        self.score_all(loaded)
    }

    /// Load from the store and score
    pub async fn run_from_store(
        &self,
        store: Arc<dyn StoragePort>,
        security_ids: &[String],
    ) -> BatchReport {
        let loaded = self.load_from_store(store, security_ids).await;
        self.score_all(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Observation, RawObservation, COL_DATE, COL_EPS, COL_PER, COL_PRICE};
    use crate::ports::{InMemoryStore, StaticRowSource};
    use chrono::{Days, NaiveDate};
    use rust_decimal_macros::dec;

    /// PER oscillating between 8 and 16 every four weeks
    fn oscillating(security_id: &str, weeks: u64) -> Vec<Observation> {
        let start = NaiveDate::from_ymd_opt(2015, 1, 2).unwrap();
        (0..weeks)
            .map(|i| {
                let per = if (i / 4) % 2 == 0 { dec!(8) } else { dec!(16) };
                Observation::new(security_id, start + Days::new(7 * i), dec!(100), Some(dec!(5)), Some(per))
            })
            .collect()
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_analyze_series_uses_lookback_window() {
        let analyzer = BatchAnalyzer::new(AnalysisParams::default(), Some(2));
        let series = Series::new("2330", oscillating("2330", 520)).unwrap();

        let analysis = analyzer.analyze_series(&series).unwrap();
        assert_eq!(analysis.card.security_id, "2330");
        assert!(analysis.summary.min_per >= 8.0);
        // Roughly five years of weekly entries are trialled
        assert!(analysis.card.trials_1m > 100 && analysis.card.trials_1m < 140);
    }

    #[test]
    fn test_score_all_keeps_order_and_collects_errors() {
        let analyzer = BatchAnalyzer::new(AnalysisParams::default(), Some(3));
        let loaded = vec![
            ("A".to_string(), Series::new("A", oscillating("A", 60))),
            (
                "B".to_string(),
                Err(AnalysisError::EmptySeries {
                    security_id: "B".to_string(),
                }),
            ),
            ("C".to_string(), Series::new("C", oscillating("C", 60))),
        ];

        let report = analyzer.score_all(loaded);
        let scored: Vec<&str> = report.cards.iter().map(|c| c.security_id.as_str()).collect();
        assert_eq!(scored, vec!["A", "C"]);
        assert_eq!(report.summaries.len(), 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].security_id, "B");
    }

    #[test]
    fn test_sparse_trailing_window_is_insufficient() {
        // 15 years; only the last five miss every other PER
        let observations: Vec<Observation> = oscillating("2330", 780)
            .into_iter()
            .enumerate()
            .map(|(i, mut o)| {
                if i >= 520 && i % 2 == 1 {
                    o.per = None;
                }
                o
            })
            .collect();
        let series = Series::new("2330", observations).unwrap();
        assert!(SeriesNormalizer::default().check_coverage(&series).is_ok());

        let analyzer = BatchAnalyzer::new(AnalysisParams::default(), None);
        let err = analyzer.analyze_series(&series).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { .. }));
    }

    #[tokio::test]
    async fn test_run_from_store_rejects_sparse_history() {
        let observations: Vec<Observation> = oscillating("1101", 100)
            .into_iter()
            .enumerate()
            .map(|(i, mut o)| {
                if i % 5 < 3 {
                    o.per = None;
                }
                o
            })
            .collect();
        let store: Arc<dyn StoragePort> =
            Arc::new(InMemoryStore::new().with_observations(observations));
        let analyzer = BatchAnalyzer::new(AnalysisParams::default(), None);

        let report = analyzer.run_from_store(store, &ids(&["1101"])).await;
        assert!(report.cards.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0].error, AnalysisError::InsufficientData { .. }));
    }

    #[tokio::test]
    async fn test_run_from_store_reads_window() {
        let store: Arc<dyn StoragePort> = Arc::new(
            InMemoryStore::new().with_observations(oscillating("2330", 520)),
        );
        let analyzer = BatchAnalyzer::new(AnalysisParams::default(), None);

        let report = analyzer.run_from_store(store, &ids(&["2330", "9999"])).await;
        assert_eq!(report.cards.len(), 1);
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0].error, AnalysisError::EmptySeries { .. }));
    }

    #[tokio::test]
    async fn test_run_from_source_normalizes() {
        let rows: Vec<RawObservation> = (1..=52u32)
            .rev()
            .map(|w| {
                let per = if (w / 4) % 2 == 0 { "8" } else { "16" };
                RawObservation::new()
                    .with(COL_DATE, &format!("23W{:02}", w))
                    .with(COL_PRICE, "100")
                    .with(COL_EPS, "5")
                    .with(COL_PER, per)
            })
            .collect();
        let source: Arc<dyn RowSource> = Arc::new(StaticRowSource::new().with_rows("2330", rows));
        let analyzer = BatchAnalyzer::new(AnalysisParams::default(), None);

        let report = analyzer.run_from_source(source, &ids(&["2330", "1101"])).await;
        assert_eq!(report.cards.len(), 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].is_retryable());
        let card = &report.cards[0];
        assert_eq!(card.current_price, 100.0);
        assert!(card.trials_1m > 0);
    }
}
