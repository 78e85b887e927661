//! Strategy Layer - Valuation normalization, statistics and median-reversion scoring
//!
//! Pure computation over one security at a time:
//! - `normalizer`: raw scraped rows -> ascending typed series
//! - `statistics`: trailing PER quartile/median/mean/extrema and range deltas
//! - `reversion`: first-touch median-reversion backtest per horizon
//! - `scoring`: combine horizons into average rate, Kelly fraction and verdict
//!
//! Policy constants live in `params` and can be overridden from config.

pub mod normalizer;
pub mod params;
pub mod reversion;
pub mod scoring;
pub mod statistics;

pub use normalizer::{parse_number, SeriesNormalizer};
pub use params::{AnalysisParams, Horizons, ParamsError};
pub use reversion::{BacktestResult, ReversionBacktester};
pub use scoring::{HorizonResults, ScoreCard, ScoringEngine};
pub use statistics::{quantile, StatisticsEngine, SummaryStatistics};
