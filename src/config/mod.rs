//! Configuration Module
//!
//! Loads and validates configuration from TOML files.

pub mod loader;

pub use loader::{
    load_config, load_security_ids, AnalysisSection, Config, ConfigError, InputSection,
    LoggingSection, OutputSection, StorageSection, DB_PATH_ENV,
};
