//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - CSV row source: scraped weekly tables saved as `<security_id>.csv`
//! - SQLite: the observation store
//! - Export: CSV/JSON report artifacts
//! - CLI: Command-line interface handlers

pub mod cli;
pub mod csv_source;
pub mod export;
pub mod sqlite;

pub use cli::CliApp;
pub use csv_source::CsvRowSource;
pub use sqlite::SqliteStore;
