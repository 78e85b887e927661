//! Year-Week Date Codes
//!
//! Weekly valuation tables label each row with a compact code such as `24W52`:
//! a two-digit year (20YY), the literal `W`, and a one or two digit ISO week.
//! Each code resolves to the Friday of that ISO week.
//!
//! Week 53 is rejected. Downstream statistics assume one observation per
//! week number per year.

use chrono::{Datelike, NaiveDate, Weekday};

use super::error::AnalysisError;

/// Separator between the year and week parts
pub const WEEK_SEPARATOR: char = 'W';

/// Highest accepted ISO week number
pub const MAX_WEEK: u32 = 52;

/// Decoder for year-week codes
#[derive(Debug, Clone, Copy, Default)]
pub struct DateCodec;

impl DateCodec {
    /// Decode a code like `24W52` into the Friday of ISO week 52 of 2024
    pub fn decode(code: &str) -> Result<NaiveDate, AnalysisError> {
        let invalid = || AnalysisError::InvalidDateCode(code.to_string());
        let trimmed = code.trim();

        let (year_part, week_part) = trimmed.split_once(WEEK_SEPARATOR).ok_or_else(invalid)?;

        if year_part.len() != 2 || !year_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if week_part.is_empty()
            || week_part.len() > 2
            || !week_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let year = 2000 + year_part.parse::<i32>().map_err(|_| invalid())?;
        let week = week_part.parse::<u32>().map_err(|_| invalid())?;
        if !(1..=MAX_WEEK).contains(&week) {
            return Err(invalid());
        }

        NaiveDate::from_isoywd_opt(year, week, Weekday::Fri).ok_or_else(invalid)
    }

    /// Encode a date back into its year-week code.
    ///
    /// Returns `None` for ISO week 53 and for years outside 2000..=2099.
    pub fn encode(date: NaiveDate) -> Option<String> {
        let iso = date.iso_week();
        let year = iso.year();
        if !(2000..=2099).contains(&year) || iso.week() > MAX_WEEK {
            return None;
        }
        Some(format!("{:02}{}{:02}", year - 2000, WEEK_SEPARATOR, iso.week()))
    }
}
