//! Maps wall-clock time-of-day to a scheduled target temperature.
//!
//! The active entry is the one with the greatest time-of-day at or before now.
//! Lookup does not wrap past midnight: before the earliest entry the schedule
//! is simply inactive and the setpoint is left where it was. That gap is
//! intentional, pending a product decision on wraparound.

use chrono::NaiveTime;
use log::warn;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleEntry {
    pub at: NaiveTime,
    pub target_temp: f64,
}

/// Parses raw store rows into ordered entries. Malformed times are skipped
/// with a warning, never fatal; duplicate times keep the last row, matching
/// the unique-key semantics of the backing table.
pub fn parse_rows(rows: &[(String, f64)]) -> Vec<ScheduleEntry> {
    let mut entries: Vec<ScheduleEntry> = Vec::with_capacity(rows.len());
    for (time, target_temp) in rows {
        match NaiveTime::parse_from_str(time, "%H:%M") {
            Ok(at) => {
                if let Some(existing) = entries.iter_mut().find(|e| e.at == at) {
                    existing.target_temp = *target_temp;
                } else {
                    entries.push(ScheduleEntry {
                        at,
                        target_temp: *target_temp,
                    });
                }
            }
            Err(e) => warn!("[Schedule] skipping malformed entry {time:?}: {e}"),
        }
    }
    entries.sort_by_key(|e| e.at);
    entries
}

/// Entry with the greatest time-of-day `<= now`, or `None` when the schedule
/// is empty or the earliest entry is still later today.
pub fn active_entry(entries: &[ScheduleEntry], now: NaiveTime) -> Option<&ScheduleEntry> {
    entries.iter().rev().find(|e| e.at <= now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    fn sample() -> Vec<ScheduleEntry> {
        parse_rows(&[("06:00".into(), 18.0), ("22:00".into(), 16.0)])
    }

    #[test]
    fn mid_morning_uses_morning_entry() {
        let entries = sample();
        let hit = active_entry(&entries, t("10:00")).unwrap();
        assert_eq!(hit.target_temp, 18.0);
    }

    #[test]
    fn before_first_entry_nothing_is_active() {
        // No wraparound to yesterday's 22:00 entry.
        let entries = sample();
        assert_eq!(active_entry(&entries, t("05:00")), None);
    }

    #[test]
    fn late_evening_uses_evening_entry() {
        let entries = sample();
        let hit = active_entry(&entries, t("23:59")).unwrap();
        assert_eq!(hit.target_temp, 16.0);
    }

    #[test]
    fn boundary_time_activates_its_entry() {
        let entries = sample();
        let hit = active_entry(&entries, t("06:00")).unwrap();
        assert_eq!(hit.target_temp, 18.0);
    }

    #[test]
    fn empty_schedule_is_never_active() {
        assert_eq!(active_entry(&[], t("12:00")), None);
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let entries = parse_rows(&[
            ("06:00".into(), 18.0),
            ("25:99".into(), 99.0),
            ("not a time".into(), 1.0),
            ("22:00".into(), 16.0),
        ]);
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn duplicate_time_keeps_last_row() {
        let entries = parse_rows(&[("06:00".into(), 18.0), ("06:00".into(), 19.5)]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].target_temp, 19.5);
    }

    #[test]
    fn rows_sorted_regardless_of_input_order() {
        let entries = parse_rows(&[("22:00".into(), 16.0), ("06:00".into(), 18.0)]);
        assert!(entries[0].at < entries[1].at);
    }
}
