//! Batch Pipeline Integration Tests
//!
//! Integration tests that verify the valuation components work together:
//! 1. Raw rows -> SeriesNormalizer -> statistics/backtests -> ScoreCards
//! 2. BatchUpdater idempotence against a store
//! 3. Failed bulk writes keep their pending deltas
//! 4. CSV files -> SQLite sync -> analysis from the store
//!
//! All tests are deterministic and use in-memory or temp-dir collaborators.

use std::sync::Arc;

use chrono::NaiveDate;
use tempfile::TempDir;

use per_reversion::adapters::{CsvRowSource, SqliteStore};
use per_reversion::application::{BatchAnalyzer, BatchUpdater, WriteOutcome};
use per_reversion::domain::{AnalysisError, RawObservation, COL_DATE, COL_EPS, COL_PER, COL_PRICE};
use per_reversion::ports::{InMemoryStore, RowSource, StaticRowSource, StoragePort};
use per_reversion::strategy::{AnalysisParams, SeriesNormalizer};

// ============================================================================
// Test Fixtures
// ============================================================================

/// PER cycle repeated through the history
const PER_CYCLE: [f64; 10] = [10.0, 11.0, 12.0, 14.0, 16.0, 18.0, 17.0, 15.0, 13.0, 11.0];

/// Year-week codes for 2020..=2024, weeks 1..=52, oldest first
fn five_year_codes() -> Vec<String> {
    (20..=24)
        .flat_map(|yy| (1..=52).map(move |w| format!("{}W{:02}", yy, w)))
        .collect()
}

/// Full scraped rows for a healthy security, newest first
fn valid_rows() -> Vec<RawObservation> {
    let mut rows: Vec<RawObservation> = five_year_codes()
        .iter()
        .enumerate()
        .map(|(i, code)| {
            let per = PER_CYCLE[i % PER_CYCLE.len()];
            let eps = 5.0;
            RawObservation::new()
                .with(COL_DATE, code)
                .with(COL_PRICE, &format!("{:.2}", per * eps))
                .with("Change", "0")
                .with("% Change", "0.00%")
                .with(COL_EPS, &format!("{:.2}", eps))
                .with(COL_PER, &format!("{:.2}", per))
                .with("8X", "40")
                .with("17X", "85")
        })
        .collect();
    rows.reverse();
    rows
}

/// Rows missing the PER column entirely
fn rows_without_per() -> Vec<RawObservation> {
    five_year_codes()
        .iter()
        .rev()
        .map(|code| {
            RawObservation::new()
                .with(COL_DATE, code)
                .with(COL_PRICE, "50")
                .with(COL_EPS, "5")
        })
        .collect()
}

fn rows_to_csv(rows: &[RawObservation]) -> String {
    let mut out = String::from("Date,Price,Change,% Change,EPS,PER\n");
    for r in rows {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            r.get(COL_DATE).unwrap_or(""),
            r.get(COL_PRICE).unwrap_or(""),
            r.get("Change").unwrap_or(""),
            r.get("% Change").unwrap_or(""),
            r.get(COL_EPS).unwrap_or(""),
            r.get(COL_PER).unwrap_or(""),
        ));
    }
    out
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ============================================================================
// End-to-end analysis
// ============================================================================

#[tokio::test]
async fn test_one_card_and_one_error() {
    let source: Arc<dyn RowSource> = Arc::new(
        StaticRowSource::new()
            .with_rows("2330", valid_rows())
            .with_rows("1101", rows_without_per()),
    );
    let analyzer = BatchAnalyzer::new(AnalysisParams::default(), Some(2));

    let report = analyzer.run_from_source(source, &ids(&["2330", "1101"])).await;

    assert_eq!(report.cards.len(), 1);
    assert_eq!(report.errors.len(), 1);

    let card = &report.cards[0];
    assert_eq!(card.security_id, "2330");
    assert!(card.trials_1m > 0);
    assert!((0.0..=1.0).contains(&card.average_rate));

    let failure = &report.errors[0];
    assert_eq!(failure.security_id, "1101");
    assert!(matches!(failure.error, AnalysisError::SchemaMismatch { .. }));
    assert!(!failure.is_retryable());
}

#[tokio::test]
async fn test_summary_uses_latest_observation() {
    let source: Arc<dyn RowSource> = Arc::new(StaticRowSource::new().with_rows("2330", valid_rows()));
    let analyzer = BatchAnalyzer::new(AnalysisParams::default(), None);

    let report = analyzer.run_from_source(source, &ids(&["2330"])).await;
    let summary = &report.summaries[0];

    // 24W52 is the 260th week: PER_CYCLE[259 % 10]
    assert_eq!(summary.latest_per, Some(11.0));
    assert_eq!(summary.min_per, 10.0);
    assert_eq!(summary.max_per, 18.0);
}

#[tokio::test]
async fn test_sparse_recent_years_are_insufficient() {
    // 2010..=2024 history; only the trailing five years miss every other PER
    let rows: Vec<RawObservation> = (10..=24)
        .flat_map(|yy| (1..=52).map(move |w| (yy, w)))
        .rev()
        .map(|(yy, w)| {
            let per = if yy >= 20 && w % 2 == 1 { "-" } else { "12.5" };
            RawObservation::new()
                .with(COL_DATE, &format!("{}W{:02}", yy, w))
                .with(COL_PRICE, "62.5")
                .with(COL_EPS, "5")
                .with(COL_PER, per)
        })
        .collect();
    let source: Arc<dyn RowSource> = Arc::new(StaticRowSource::new().with_rows("2303", rows));
    let analyzer = BatchAnalyzer::new(AnalysisParams::default(), None);

    let report = analyzer.run_from_source(source, &ids(&["2303"])).await;

    assert!(report.cards.is_empty());
    assert_eq!(report.errors.len(), 1);
    assert!(matches!(report.errors[0].error, AnalysisError::InsufficientData { .. }));
}

// ============================================================================
// Sync
// ============================================================================

#[tokio::test]
async fn test_sync_is_idempotent() {
    let store = Arc::new(InMemoryStore::new());
    let source = Arc::new(StaticRowSource::new().with_rows("2330", valid_rows()));
    let updater = BatchUpdater::new(store.clone(), source, SeriesNormalizer::default());
    let today = day(2025, 1, 15);

    let first = updater.run(&ids(&["2330"]), today).await;
    assert_eq!(first.updated, ids(&["2330"]));
    assert_eq!(first.write, WriteOutcome::Committed { rows: 260 });

    // Store is behind `today`, so the source is consulted again but yields nothing new
    let second = updater.run(&ids(&["2330"]), today).await;
    assert!(second.updated.is_empty());
    assert_eq!(second.already_up_to_date, ids(&["2330"]));
    assert_eq!(second.write, WriteOutcome::Nothing);

    assert_eq!(store.insert_calls().await, vec![260]);
    assert_eq!(store.len().await, 260);
}

#[tokio::test]
async fn test_failed_write_keeps_pending_deltas() {
    let store = Arc::new(InMemoryStore::new());
    store.set_fail_writes(true);
    let source = Arc::new(
        StaticRowSource::new()
            .with_rows("2330", valid_rows())
            .with_rows("1101", rows_without_per()),
    );
    let updater = BatchUpdater::new(store.clone(), source, SeriesNormalizer::default());

    let report = updater.run(&ids(&["2330", "1101"]), day(2025, 1, 15)).await;

    assert!(report.updated.is_empty());
    assert_eq!(report.errors.len(), 1);
    match &report.write {
        WriteOutcome::Failed { error, pending, .. } => {
            assert!(matches!(error, AnalysisError::PersistenceFailure(_)));
            assert_eq!(pending.len(), 1);
            assert_eq!(pending[0].security_id, "2330");
            assert_eq!(pending[0].len(), 260);
        }
        other => panic!("expected failed write, got {:?}", other),
    }
    assert!(store.is_empty().await);
}

// ============================================================================
// Files -> SQLite -> analysis
// ============================================================================

#[tokio::test]
async fn test_csv_sync_then_analyze_from_store() {
    let dir = TempDir::new().unwrap();
    let raw_dir = dir.path().join("raw");
    std::fs::create_dir_all(&raw_dir).unwrap();
    std::fs::write(raw_dir.join("2330.csv"), rows_to_csv(&valid_rows())).unwrap();

    let store = Arc::new(SqliteStore::open(dir.path().join("valuation.db")).unwrap());
    let source = Arc::new(CsvRowSource::new(raw_dir.clone()));
    let updater = BatchUpdater::new(store.clone(), source, SeriesNormalizer::default());

    let report = updater.run(&ids(&["2330", "2303"]), day(2025, 1, 15)).await;
    assert_eq!(report.updated, ids(&["2330"]));
    assert_eq!(report.fetch_failures.len(), 1);
    assert_eq!(report.fetch_failures[0].security_id, "2303");

    let latest = store.get_latest("2330").await.unwrap().unwrap();
    assert_eq!(latest.date, day(2024, 12, 27));

    let analyzer = BatchAnalyzer::new(AnalysisParams::default(), None);
    let analysis = analyzer.run_from_store(store, &ids(&["2330"])).await;
    assert_eq!(analysis.cards.len(), 1);
    assert!(analysis.errors.is_empty());
}
