//! Domain Layer - Typed valuation records and calendar rules
//!
//! Pure types and functions with no I/O:
//! - `date_code`: year-week code decoding (`24W52` -> Friday)
//! - `calendar`: freshness and trailing-window date arithmetic
//! - `observation`: raw rows, typed observations and ordered series
//! - `error`: the row/security/batch error taxonomy

pub mod calendar;
pub mod date_code;
pub mod error;
pub mod observation;

pub use calendar::{expected_freshness_date, is_up_to_date, years_before};
pub use date_code::DateCodec;
pub use error::AnalysisError;
pub use observation::{
    Observation, RawObservation, Series, COL_DATE, COL_EPS, COL_PER, COL_PRICE, REQUIRED_COLUMNS,
};
