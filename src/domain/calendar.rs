//! Trading-week calendar helpers

use chrono::{Datelike, Days, NaiveDate, Weekday};

/// Latest date a fully synced weekly series must reach as of `today`.
///
/// Weekly rows are dated on Fridays and the current week's row already carries
/// this Friday's date, so on weekdays the series must reach `today`. On Saturday
/// and Sunday the expectation rolls back to the preceding Friday.
pub fn expected_freshness_date(today: NaiveDate) -> NaiveDate {
    let back = match today.weekday() {
        Weekday::Sat => 1,
        Weekday::Sun => 2,
        _ => 0,
    };
    today.checked_sub_days(Days::new(back)).unwrap_or(today)
}

/// Whether a series whose last stored observation is dated `last_stored` is fresh as of `today`
pub fn is_up_to_date(last_stored: NaiveDate, today: NaiveDate) -> bool {
    last_stored >= expected_freshness_date(today)
}

/// Date `years` calendar years before `date`, clamping Feb 29 to Feb 28
pub fn years_before(date: NaiveDate, years: u32) -> NaiveDate {
    let year = date.year() - years as i32;
    NaiveDate::from_ymd_opt(year, date.month(), date.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), 28))
        .unwrap_or(date)
}
