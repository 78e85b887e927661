//! CLI Command Handlers
//!
//! Implementation of all CLI commands for the PER reversion screener.

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::adapters::csv_source::CsvRowSource;
use crate::adapters::export;
use crate::adapters::sqlite::SqliteStore;
use crate::application::{BatchAnalyzer, BatchReport, BatchUpdater, SyncReport, WriteOutcome};
use crate::config::{load_config, load_security_ids, Config};
use crate::domain::{expected_freshness_date, is_up_to_date, DateCodec};
use crate::ports::{RowSource, StoragePort};
use crate::strategy::SeriesNormalizer;

/// PER Reversion - weekly valuation screener and median-reversion backtester
#[derive(Parser, Debug)]
#[command(
    name = "per-reversion",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Weekly PER valuation screener with median-reversion backtests",
    long_about = "per-reversion normalizes weekly price/EPS/PER tables, keeps an incremental \
                  SQLite history and scores each security by how reliably its PER reverts \
                  toward its trailing median."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        default_value = "config/analysis.toml"
    )]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score securities and print the verdict table
    Analyze(AnalyzeCmd),

    /// Bring the SQLite history up to date from raw row files
    Sync(SyncCmd),

    /// Show the latest stored week and freshness per security
    Status(StatusCmd),

    /// Decode a year-week code such as 24W52
    Decode(DecodeCmd),
}

/// Score securities
#[derive(Parser, Debug)]
pub struct AnalyzeCmd {
    /// Security ids (defaults to the configured securities file)
    #[arg(value_name = "SECURITY")]
    pub securities: Vec<String>,

    /// Read series from the SQLite store instead of raw row files
    #[arg(long)]
    pub from_store: bool,

    /// Only list securities with a positive verdict
    #[arg(long)]
    pub candidates_only: bool,

    /// Output format (text, json)
    #[arg(short, long, value_name = "FORMAT", default_value = "text")]
    pub format: String,

    /// Export score cards to CSV
    #[arg(long, value_name = "FILE")]
    pub export_csv: Option<PathBuf>,

    /// Export the full report to JSON
    #[arg(long, value_name = "FILE")]
    pub export_json: Option<PathBuf>,

    /// Write all report artifacts to the configured results directory
    #[arg(long)]
    pub save: bool,
}

/// Sync the store
#[derive(Parser, Debug)]
pub struct SyncCmd {
    /// Security ids (defaults to the configured securities file)
    #[arg(value_name = "SECURITY")]
    pub securities: Vec<String>,

    /// Override the reference date (YYYY-MM-DD) used for freshness checks
    #[arg(long, value_name = "DATE")]
    pub today: Option<NaiveDate>,
}

/// Store status
#[derive(Parser, Debug)]
pub struct StatusCmd {
    /// Security ids (defaults to the configured securities file)
    #[arg(value_name = "SECURITY")]
    pub securities: Vec<String>,
}

/// Decode a date code
#[derive(Parser, Debug)]
pub struct DecodeCmd {
    /// Year-week code, e.g. 24W52
    #[arg(value_name = "CODE")]
    pub code: String,
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    let config = load_or_default(&app.config)?;

    // Initialize logging based on flags
    init_logging(app.verbose, app.debug, &config.logging.level)?;

    match app.command {
        Command::Analyze(cmd) => analyze_command(cmd, &config).await,
        Command::Sync(cmd) => sync_command(cmd, &config).await,
        Command::Status(cmd) => status_command(cmd, &config).await,
        Command::Decode(cmd) => decode_command(cmd),
    }
}

/// Load the config file, falling back to defaults when it does not exist
fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    load_config(path).with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// Initialize logging system
fn init_logging(verbose: bool, debug: bool, config_level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        config_level
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

fn resolve_securities(explicit: Vec<String>, config: &Config) -> Result<Vec<String>> {
    if !explicit.is_empty() {
        return Ok(explicit);
    }
    let path = config.securities_file();
    let ids = load_security_ids(&path)
        .with_context(|| format!("Failed to read securities list {}", path.display()))?;
    if ids.is_empty() {
        bail!("No securities listed in {}", path.display());
    }
    Ok(ids)
}

fn open_store(config: &Config) -> Result<Arc<SqliteStore>> {
    let path = config.storage.get_database_path();
    let store = SqliteStore::open(&path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Handle analyze command
async fn analyze_command(cmd: AnalyzeCmd, config: &Config) -> Result<()> {
    let securities = resolve_securities(cmd.securities, config)?;
    let analyzer = BatchAnalyzer::new(config.analysis_params(), config.analysis.workers);

    tracing::info!("Analyzing {} securities", securities.len());
    let report = if cmd.from_store {
        let store: Arc<dyn StoragePort> = open_store(config)?;
        analyzer.run_from_store(store, &securities).await
    } else {
        let source: Arc<dyn RowSource> = Arc::new(CsvRowSource::new(config.raw_dir()));
        analyzer.run_from_source(source, &securities).await
    };

    match cmd.format.as_str() {
        "json" => println!("{}", export::export_json(&report)?),
        _ => print_report(&report, cmd.candidates_only),
    }

    if let Some(path) = cmd.export_csv {
        std::fs::write(&path, export::export_cards_csv(&report.cards)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Score cards exported to {}", path.display());
    }
    if let Some(path) = cmd.export_json {
        std::fs::write(&path, export::export_json(&report)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Report exported to {}", path.display());
    }
    if cmd.save {
        for path in export::save_report(&report, &config.results_dir())? {
            println!("Saved {}", path.display());
        }
    }

    Ok(())
}

fn fmt_opt(value: Option<f64>, scale: f64) -> String {
    value
        .map(|v| format!("{:.2}", v * scale))
        .unwrap_or_else(|| "N/A".to_string())
}

fn print_report(report: &BatchReport, candidates_only: bool) {
    println!(
        "{:<10} {:>10} {:>10} {:>9} {:>7} {:>7} {:>7} {:>7} {:>8} {:>8}",
        "Security", "Price", "Median$", "Upside%", "1M", "2M", "3M", "Avg", "Kelly", "Verdict"
    );
    println!("{}", "─".repeat(94));

    for c in report.cards.iter().filter(|c| !candidates_only || c.verdict) {
        println!(
            "{:<10} {:>10.2} {:>10} {:>9} {:>7.3} {:>7.3} {:>7.3} {:>7.3} {:>8} {:>8}",
            c.security_id,
            c.current_price,
            fmt_opt(c.median_price, 1.0),
            fmt_opt(c.price_upside_pct, 100.0),
            c.rate_1m,
            c.rate_2m,
            c.rate_3m,
            c.average_rate,
            fmt_opt(c.kelly_fraction, 1.0),
            if c.verdict { "BUY" } else { "-" },
        );
    }

    println!(
        "\n{} scored, {} candidates, {} skipped",
        report.cards.len(),
        report.candidates().count(),
        report.errors.len()
    );
    for failure in &report.errors {
        println!("  ✗ {}: {}", failure.security_id, failure.error);
    }
}

/// Handle sync command
async fn sync_command(cmd: SyncCmd, config: &Config) -> Result<()> {
    let securities = resolve_securities(cmd.securities, config)?;
    let today = cmd.today.unwrap_or_else(|| Local::now().date_naive());

    let store: Arc<dyn StoragePort> = open_store(config)?;
    let source: Arc<dyn RowSource> = Arc::new(CsvRowSource::new(config.raw_dir()));
    let normalizer = SeriesNormalizer::new(&config.analysis_params());
    let updater = BatchUpdater::new(store, source, normalizer);

    tracing::info!(
        "Syncing {} securities (expecting data through {})",
        securities.len(),
        expected_freshness_date(today)
    );
    let report = updater.run(&securities, today).await;
    print_sync_report(&report);

    if let WriteOutcome::Failed { error, pending, .. } = &report.write {
        bail!(
            "Bulk insert failed ({}); {} securities pending: {}",
            error,
            pending.len(),
            report.write.pending_security_ids().join(", ")
        );
    }
    Ok(())
}

fn print_sync_report(report: &SyncReport) {
    println!("Updated ({}): {}", report.updated.len(), report.updated.join(", "));
    println!(
        "Already up to date ({}): {}",
        report.already_up_to_date.len(),
        report.already_up_to_date.join(", ")
    );
    println!("Errors ({}):", report.errors.len() + report.fetch_failures.len());
    for failure in report.errors.iter().chain(&report.fetch_failures) {
        let tag = if failure.is_retryable() { "retry" } else { "data" };
        println!("  ✗ [{}] {}: {}", tag, failure.security_id, failure.error);
    }
    if let WriteOutcome::Committed { rows } = report.write {
        println!("Committed {} rows", rows);
    }
}

/// Handle status command
async fn status_command(cmd: StatusCmd, config: &Config) -> Result<()> {
    let securities = resolve_securities(cmd.securities, config)?;
    let store = open_store(config)?;
    let today = Local::now().date_naive();

    println!("Expected data through {}", expected_freshness_date(today));
    println!("{:<10} {:>12} {:>8}", "Security", "Latest", "Fresh");
    for security_id in &securities {
        match store.get_latest(security_id).await {
            Ok(Some(latest)) => println!(
                "{:<10} {:>12} {:>8}",
                security_id,
                latest.date,
                if is_up_to_date(latest.date, today) { "yes" } else { "no" }
            ),
            Ok(None) => println!("{:<10} {:>12} {:>8}", security_id, "-", "no"),
            Err(e) => println!("{:<10} error: {}", security_id, e),
        }
    }
    Ok(())
}

/// Handle decode command
fn decode_command(cmd: DecodeCmd) -> Result<()> {
    let date = DateCodec::decode(&cmd.code)?;
    println!("{} -> {} ({})", cmd.code, date, date.format("%A"));
    Ok(())
}
