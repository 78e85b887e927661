//! Sync Reconciler
//!
//! Decides which observations of a freshly normalized series are new
//! relative to the store. Re-running with nothing new yields an empty delta.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{calendar, Observation, Series};

/// Observations to persist for one security, ascending by date
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncDelta {
    pub security_id: String,
    pub new_observations: Vec<Observation>,
}

impl SyncDelta {
    pub fn is_empty(&self) -> bool {
        self.new_observations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.new_observations.len()
    }

    /// Date of the newest observation in the delta
    pub fn max_date(&self) -> Option<NaiveDate> {
        self.new_observations.last().map(|o| o.date)
    }
}

/// Diff-based reconciler between incoming series and stored state
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncReconciler;

impl SyncReconciler {
    pub fn new() -> Self {
        Self
    }

    /// Every incoming observation dated strictly after the last stored one.
    ///
    /// With nothing stored the whole series is new.
    pub fn reconcile(&self, incoming: &Series, last_stored: Option<&Observation>) -> SyncDelta {
        let new_observations = match last_stored {
            Some(last) => incoming.after(last.date).to_vec(),
            None => incoming.observations().to_vec(),
        };

        SyncDelta {
            security_id: incoming.security_id().to_string(),
            new_observations,
        }
    }

    /// Whether the stored history already covers the latest expected trading week
    pub fn is_up_to_date(&self, last_stored: Option<&Observation>, today: NaiveDate) -> bool {
        last_stored.is_some_and(|last| calendar::is_up_to_date(last.date, today))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;
    use rust_decimal_macros::dec;

    fn series(start: NaiveDate, weeks: u64) -> Series {
        let observations = (0..weeks)
            .map(|i| Observation::new("2330", start + Days::new(7 * i), dec!(600), None, Some(dec!(15))))
            .collect();
        Series::new("2330", observations).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_first_sync_takes_everything() {
        let incoming = series(d(2024, 1, 5), 10);
        let delta = SyncReconciler::new().reconcile(&incoming, None);
        assert_eq!(delta.len(), 10);
        assert_eq!(delta.security_id, "2330");
    }

    #[test]
    fn test_only_strictly_newer_rows() {
        let incoming = series(d(2024, 1, 5), 10);
        let last = incoming.observations()[6].clone();
        let delta = SyncReconciler::new().reconcile(&incoming, Some(&last));
        assert_eq!(delta.len(), 3);
        assert!(delta.new_observations.iter().all(|o| o.date > last.date));
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let reconciler = SyncReconciler::new();
        let incoming = series(d(2024, 1, 5), 10);
        let stored = incoming.observations()[3].clone();

        let first = reconciler.reconcile(&incoming, Some(&stored));
        assert!(!first.is_empty());

        let newest = first.new_observations.last().cloned().unwrap();
        assert_eq!(Some(newest.date), first.max_date());
        let second = reconciler.reconcile(&incoming, Some(&newest));
        assert!(second.is_empty());
    }

    #[test]
    fn test_stored_ahead_of_source() {
        let incoming = series(d(2024, 1, 5), 4);
        let ahead = Observation::new("2330", d(2024, 6, 7), dec!(1), None, None);
        let delta = SyncReconciler::new().reconcile(&incoming, Some(&ahead));
        assert!(delta.is_empty());
    }

    #[test]
    fn test_freshness() {
        let reconciler = SyncReconciler::new();
        let last = Observation::new("2330", d(2024, 12, 27), dec!(1), None, None);
        // Sunday 2024-12-29 expects Friday 2024-12-27
        assert!(reconciler.is_up_to_date(Some(&last), d(2024, 12, 29)));
        // Monday 2024-12-30 expects itself
        assert!(!reconciler.is_up_to_date(Some(&last), d(2024, 12, 30)));
        assert!(!reconciler.is_up_to_date(None, d(2024, 12, 29)));
    }
}
