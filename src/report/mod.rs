//! Daily report state and schedule.

use alloy::primitives::Address;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use std::collections::HashSet;

/// Unique signer addresses since the last daily report.
///
/// Owned by the event loop; `drain` snapshots the count and clears in one
/// step, so a stake arriving mid-report can never fall between snapshot and
/// clear. Membership is on the typed address, so two hex spellings of the
/// same account count once.
#[derive(Debug, Default)]
pub struct DailySigners {
    seen: HashSet<Address>,
}

impl DailySigners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when this address was not yet counted today.
    pub fn insert(&mut self, address: Address) -> bool {
        self.seen.insert(address)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Snapshot the count and reset for the next day.
    pub fn drain(&mut self) -> usize {
        let count = self.seen.len();
        self.seen.clear();
        count
    }
}

/// Fixed UTC fire time for the daily report.
#[derive(Debug, Clone, Copy)]
pub struct ReportSchedule {
    hour: u32,
    minute: u32,
    second: u32,
}

impl ReportSchedule {
    pub fn new(hour: u32, minute: u32, second: u32) -> Self {
        Self { hour, minute, second }
    }

    pub fn from_config(config: &crate::config::ReportConfig) -> Self {
        Self::new(config.utc_hour, config.utc_minute, config.utc_second)
    }

    /// Next fire instant strictly after `now`. If today's instant has already
    /// passed (or is exactly now), the report fires tomorrow. Recomputing
    /// this after every fire keeps the schedule anchored to the wall clock
    /// instead of drifting with a fixed 24h interval.
    pub fn next_fire_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let at = NaiveTime::from_hms_opt(self.hour, self.minute, self.second)
            .unwrap_or(NaiveTime::MIN);
        let today = now.date_naive().and_time(at).and_utc();
        if now < today {
            today
        } else {
            today + Duration::days(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    #[test]
    fn test_mixed_case_address_counts_once() {
        let upper = format!("0x{}1", "A".repeat(39));
        let lower = upper.to_lowercase();

        let mut signers = DailySigners::new();
        assert!(signers.insert(Address::from_str(&upper).unwrap()));
        assert!(!signers.insert(Address::from_str(&lower).unwrap()));
        assert_eq!(signers.len(), 1);
    }

    #[test]
    fn test_drain_resets_for_fresh_count() {
        let mut signers = DailySigners::new();
        signers.insert(Address::repeat_byte(0x01));
        signers.insert(Address::repeat_byte(0x02));

        assert_eq!(signers.drain(), 2);
        assert!(signers.is_empty());

        // A stake right after the report starts a fresh count of 1
        assert!(signers.insert(Address::repeat_byte(0x01)));
        assert_eq!(signers.len(), 1);
    }

    #[test]
    fn test_fire_later_today_when_before_instant() {
        let schedule = ReportSchedule::new(0, 0, 30);
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap();
        assert_eq!(
            schedule.next_fire_after(now),
            Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 30).unwrap()
        );
    }

    #[test]
    fn test_fire_tomorrow_when_past_instant() {
        let schedule = ReportSchedule::new(0, 0, 30);
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        assert_eq!(
            schedule.next_fire_after(now),
            Utc.with_ymd_and_hms(2024, 5, 11, 0, 0, 30).unwrap()
        );
    }

    #[test]
    fn test_fire_tomorrow_at_exact_instant() {
        let schedule = ReportSchedule::new(0, 0, 30);
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 30).unwrap();
        assert_eq!(
            schedule.next_fire_after(now),
            Utc.with_ymd_and_hms(2024, 5, 11, 0, 0, 30).unwrap()
        );
    }
}
