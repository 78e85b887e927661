//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching analysis.toml structure.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::strategy::params::{
    AnalysisParams, Horizons, DEFAULT_ENTRY_QUARTILE, DEFAULT_LOOKBACK_YEARS, DEFAULT_MAX_EPS,
    DEFAULT_MAX_PER, DEFAULT_NAN_THRESHOLD, DEFAULT_VERDICT_THRESHOLD,
};

/// Env var overriding `[storage] database_path`
pub const DB_PATH_ENV: &str = "VALUATION_DB_PATH";

/// Main configuration structure matching analysis.toml
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisSection,
    #[serde(default)]
    pub input: InputSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Analysis policy section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisSection {
    /// Maximum share of rows with missing PER
    pub nan_threshold: f64,
    /// Entry percentile (0.25 = first quartile)
    pub entry_quartile: f64,
    /// Average reversion rate needed for a positive verdict
    pub verdict_threshold: f64,
    /// Lookahead horizons in weeks
    pub horizons: Horizons,
    /// Trailing years analysed; 0 analyses the full history
    pub lookback_years: u32,
    /// PER values above this are treated as missing
    pub max_per: f64,
    /// EPS values above this are treated as missing
    pub max_eps: f64,
    /// Scoring worker threads (rayon global pool when unset)
    pub workers: Option<usize>,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            nan_threshold: DEFAULT_NAN_THRESHOLD,
            entry_quartile: DEFAULT_ENTRY_QUARTILE,
            verdict_threshold: DEFAULT_VERDICT_THRESHOLD,
            horizons: Horizons::default(),
            lookback_years: DEFAULT_LOOKBACK_YEARS,
            max_per: DEFAULT_MAX_PER,
            max_eps: DEFAULT_MAX_EPS,
            workers: None,
        }
    }
}

/// Raw input section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputSection {
    /// Directory holding `<security_id>.csv` raw row files
    pub raw_dir: String,
    /// File listing one security id per line
    pub securities_file: String,
}

impl Default for InputSection {
    fn default() -> Self {
        Self {
            raw_dir: "data/raw".to_string(),
            securities_file: "data/securities.txt".to_string(),
        }
    }
}

/// Storage section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// SQLite database file
    pub database_path: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            database_path: "data/valuation.db".to_string(),
        }
    }
}

impl StorageSection {
    /// Database path with environment variable override and `~` expansion.
    /// Checks VALUATION_DB_PATH env var first, falls back to config value
    pub fn get_database_path(&self) -> PathBuf {
        let raw = std::env::var(DB_PATH_ENV).unwrap_or_else(|_| self.database_path.clone());
        expand(&raw)
    }
}

/// Output section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    /// Directory for exported reports
    pub results_dir: String,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            results_dir: "data/results".to_string(),
        }
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Read a securities list: one id per line, blank lines and `#` comments ignored
pub fn load_security_ids<P: AsRef<Path>>(path: P) -> Result<Vec<String>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.analysis_params()
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.analysis.workers == Some(0) {
            return Err(ConfigError::ValidationError(
                "workers must be > 0 when set".to_string(),
            ));
        }

        if self.input.raw_dir.is_empty() {
            return Err(ConfigError::ValidationError(
                "raw_dir cannot be empty".to_string(),
            ));
        }

        if self.storage.database_path.is_empty() {
            return Err(ConfigError::ValidationError(
                "database_path cannot be empty".to_string(),
            ));
        }

        if self.output.results_dir.is_empty() {
            return Err(ConfigError::ValidationError(
                "results_dir cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn raw_dir(&self) -> PathBuf {
        expand(&self.input.raw_dir)
    }

    pub fn securities_file(&self) -> PathBuf {
        expand(&self.input.securities_file)
    }

    pub fn results_dir(&self) -> PathBuf {
        expand(&self.output.results_dir)
    }

    /// Analysis parameters for the strategy layer
    pub fn analysis_params(&self) -> AnalysisParams {
        AnalysisParams::from(self)
    }
}

// Conversion from Config to AnalysisParams
impl From<&Config> for AnalysisParams {
    fn from(config: &Config) -> Self {
        let a = &config.analysis;
        AnalysisParams {
            nan_threshold: a.nan_threshold,
            entry_quartile: a.entry_quartile,
            verdict_threshold: a.verdict_threshold,
            horizons: a.horizons,
            lookback_years: Some(a.lookback_years).filter(|&y| y > 0),
            max_per: a.max_per,
            max_eps: a.max_eps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> String {
        r#"
[analysis]
nan_threshold = 0.2
entry_quartile = 0.25
verdict_threshold = 0.84
lookback_years = 5
max_per = 1000000.0
max_eps = 1000000.0
workers = 4

[analysis.horizons]
one_month = 4
two_months = 8
three_months = 12

[input]
raw_dir = "data/raw"
securities_file = "data/securities.txt"

[storage]
database_path = "~/valuation/valuation.db"

[output]
results_dir = "data/results"

[logging]
level = "info"
"#
        .to_string()
    }

    #[test]
    fn test_load_valid_config() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(create_valid_config().as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();

        assert_eq!(config.analysis.horizons.as_array(), [4, 8, 12]);
        assert_eq!(config.analysis.workers, Some(4));
        assert_eq!(config.logging.level, "info");
        assert!(!config.storage.database_path.is_empty());

        let params = config.analysis_params();
        assert_eq!(params.lookback_years, Some(5));
        assert_eq!(params.verdict_threshold, 0.84);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.analysis.nan_threshold, 0.2);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_zero_lookback_means_full_history() {
        let config: Config = toml::from_str("[analysis]\nlookback_years = 0\n").unwrap();
        assert_eq!(config.analysis_params().lookback_years, None);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/path/analysis.toml");
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ConfigError::IoError(_)));
    }

    #[test]
    fn test_invalid_verdict_threshold() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[analysis]\nverdict_threshold = 1.5\n").unwrap();

        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[analysis\nnan_threshold = ").unwrap();
        assert!(matches!(load_config(file.path()), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_tilde_expansion() {
        let storage = StorageSection {
            database_path: "~/valuation.db".to_string(),
        };
        if std::env::var(DB_PATH_ENV).is_err() {
            assert!(!storage.get_database_path().starts_with("~"));
        }
    }

    #[test]
    fn test_load_security_ids() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"2330\n\n# cement\n1101\n  2303  \n").unwrap();
        let ids = load_security_ids(file.path()).unwrap();
        assert_eq!(ids, vec!["2330", "1101", "2303"]);
    }
}
