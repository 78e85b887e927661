//! Report export - CSV and JSON artifacts
//!
//! CSV has one row per security. Undefined numbers are written as empty
//! cells in CSV and as `null` in JSON.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::BatchReport;
use crate::strategy::{ScoreCard, SummaryStatistics};

fn num(value: f64, precision: usize) -> String {
    if value.is_finite() {
        format!("{:.*}", precision, value)
    } else {
        String::new()
    }
}

fn opt(value: Option<f64>, precision: usize) -> String {
    value.map(|v| num(v, precision)).unwrap_or_default()
}

/// Export score cards as CSV.
///
/// Columns: security_id, current_price, median_price, price_upside_pct,
/// rate_1m, rate_2m, rate_3m, average_rate, kelly_fraction, verdict,
/// trials_1m, trials_2m, trials_3m, successes_1m, successes_2m, successes_3m
pub fn export_cards_csv(cards: &[ScoreCard]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "security_id",
        "current_price",
        "median_price",
        "price_upside_pct",
        "rate_1m",
        "rate_2m",
        "rate_3m",
        "average_rate",
        "kelly_fraction",
        "verdict",
        "trials_1m",
        "trials_2m",
        "trials_3m",
        "successes_1m",
        "successes_2m",
        "successes_3m",
    ])?;

    for c in cards {
        wtr.write_record([
            &c.security_id,
            &num(c.current_price, 2),
            &opt(c.median_price, 2),
            &opt(c.price_upside_pct, 4),
            &num(c.rate_1m, 4),
            &num(c.rate_2m, 4),
            &num(c.rate_3m, 4),
            &num(c.average_rate, 4),
            &opt(c.kelly_fraction, 4),
            &c.verdict.to_string(),
            &c.trials_1m.to_string(),
            &c.trials_2m.to_string(),
            &c.trials_3m.to_string(),
            &c.successes_1m.to_string(),
            &c.successes_2m.to_string(),
            &c.successes_3m.to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export summary statistics as CSV.
pub fn export_summaries_csv(summaries: &[SummaryStatistics]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "security_id",
        "latest_price",
        "latest_per",
        "quartile_25_per",
        "median_per",
        "mean_per",
        "min_per",
        "max_per",
        "quartile_delta",
        "median_delta",
        "mean_delta",
        "min_delta",
    ])?;

    for s in summaries {
        wtr.write_record([
            &s.security_id,
            &num(s.latest_price, 2),
            &opt(s.latest_per, 2),
            &num(s.quartile_25_per, 2),
            &num(s.median_per, 2),
            &num(s.mean_per, 2),
            &num(s.min_per, 2),
            &num(s.max_per, 2),
            &opt(s.quartile_delta, 2),
            &opt(s.median_delta, 2),
            &opt(s.mean_delta, 2),
            &opt(s.min_delta, 2),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Serialize a batch report to pretty JSON
pub fn export_json(report: &BatchReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize batch report to JSON")
}

/// Write `scores.csv`, `summary.csv` and `report.json` under `output_dir`.
///
/// Returns the paths written.
pub fn save_report(report: &BatchReport, output_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;

    let artifacts = [
        ("scores.csv", export_cards_csv(&report.cards)?),
        ("summary.csv", export_summaries_csv(&report.summaries)?),
        ("report.json", export_json(report)?),
    ];

    let mut written = Vec::with_capacity(artifacts.len());
    for (name, contents) in artifacts {
        let path = output_dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}
