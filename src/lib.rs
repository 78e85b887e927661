//! PER Reversion - Weekly valuation screener library
//!
//! Normalizes scraped weekly price/EPS/PER tables, keeps an incremental
//! observation store in sync, and scores each security by how reliably its
//! PER reverts toward the trailing median after dipping below the first quartile.
//!
//! # Modules
//!
//! - `domain`: Typed records (Observation, Series), date codes, calendar, errors
//! - `ports`: Trait abstractions (StoragePort, RowSource) plus in-memory fakes
//! - `strategy`: Normalizer, statistics, reversion backtest, scoring
//! - `adapters`: External implementations (CSV rows, SQLite, export, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Sync reconciler, batch updater and batch analyzer

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod strategy;
