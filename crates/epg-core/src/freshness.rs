//! Decides whether held data still reflects the most recent expected
//! upstream refresh, given a fixed daily update schedule (reference-zone
//! hours of day).

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::Serialize;

use crate::clock;

#[derive(Debug, Clone, Serialize)]
pub struct Freshness {
    pub fresh: bool,
    /// Human-readable age: "12분 전", "3시간 전", or an absolute
    /// "MM/DD HH:MM" stamp once older than a day.
    #[serde(rename = "lastLabel")]
    pub last_label: String,
    /// Reference-zone hour of the next expected upstream refresh.
    #[serde(rename = "nextHour")]
    pub next_hour: u32,
}

/// Evaluate freshness of data generated at `updated_at` as seen at `now`.
///
/// Data is fresh when it was generated at or after the most recent
/// scheduled slot (plus `grace_min` minutes of tolerated generation
/// latency). When the current hour precedes the day's first slot, the
/// most recent slot is the previous day's last one.
pub fn evaluate(
    updated_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    update_hours: &[u32],
    grace_min: u32,
) -> Freshness {
    let hours: Vec<u32> = update_hours.iter().copied().filter(|h| *h <= 23).collect();
    let now_hour = clock::reference_hour_at(now);

    let next_hour = hours
        .iter()
        .copied()
        .filter(|h| *h > now_hour)
        .min()
        .or_else(|| hours.iter().copied().min())
        .unwrap_or(0);

    let Some(updated_at) = updated_at else {
        return Freshness {
            fresh: false,
            last_label: "업데이트 정보 없음".to_string(),
            next_hour,
        };
    };

    let fresh = match last_scheduled_instant(now, &hours, grace_min) {
        Some(deadline) => updated_at >= deadline,
        // Empty schedule: there is no slot to be stale against.
        None => true,
    };

    Freshness {
        fresh,
        last_label: age_label(updated_at, now),
        next_hour,
    }
}

/// Absolute instant of the most recent scheduled slot, grace included.
fn last_scheduled_instant(
    now: DateTime<Utc>,
    hours: &[u32],
    grace_min: u32,
) -> Option<DateTime<Utc>> {
    let now_ref = now.with_timezone(&clock::reference_offset());
    let now_hour = now_ref.hour();

    let (slot_hour, days_back) = match hours.iter().copied().filter(|h| *h <= now_hour).max() {
        Some(h) => (h, 0),
        // Before the first slot of the day: the previous day's last slot.
        None => (hours.iter().copied().max()?, 1),
    };

    let date = now_ref.date_naive() - Duration::days(days_back);
    let wall = date.and_hms_opt(slot_hour, grace_min.min(59), 0)?;

    // Reference-zone wall time → absolute instant via the fixed offset.
    Some(DateTime::<Utc>::from_naive_utc_and_offset(
        wall - Duration::seconds(clock::KST_OFFSET_SECS as i64),
        Utc,
    ))
}

fn age_label(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff_min = (now - updated_at).num_minutes().max(0);
    if diff_min < 60 {
        format!("{}분 전", diff_min)
    } else if diff_min < 1440 {
        format!("{}시간 전", diff_min / 60)
    } else {
        updated_at
            .with_timezone(&clock::reference_offset())
            .format("%m/%d %H:%M")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SCHEDULE: &[u32] = &[0, 6, 12, 18];

    /// Reference-zone (KST) wall time → Utc instant.
    fn kst(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        clock::reference_offset()
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_fresh_after_latest_slot() {
        // 19:30 reference time; last slot 18:00 + 5 min grace
        let now = kst(2025, 3, 11, 19, 30);
        let f = evaluate(Some(kst(2025, 3, 11, 18, 5)), now, SCHEDULE, 5);
        assert!(f.fresh);

        let f = evaluate(Some(kst(2025, 3, 11, 17, 59)), now, SCHEDULE, 5);
        assert!(!f.fresh);
        assert_eq!(f.next_hour, 0);
    }

    #[test]
    fn test_boundaries_around_each_slot() {
        for &slot in &[6u32, 12, 18] {
            // one minute before the slot: previous slot governs
            let before = kst(2025, 3, 11, slot - 1, 59);
            let f = evaluate(Some(kst(2025, 3, 11, slot - 6, 10)), before, SCHEDULE, 5);
            assert!(f.fresh, "slot {} minus: prior-slot data should be fresh", slot);
            assert_eq!(f.next_hour, slot);

            // once inside the slot hour, data from the previous slot is stale
            let after = kst(2025, 3, 11, slot, 30);
            let f = evaluate(Some(kst(2025, 3, 11, slot - 6, 10)), after, SCHEDULE, 5);
            assert!(!f.fresh, "slot {} plus: prior-slot data should be stale", slot);
        }
    }

    #[test]
    fn test_wraparound_before_first_slot() {
        // No 0-hour slot: at 02:00 the governing slot is yesterday 18:05
        let schedule = &[6u32, 12, 18];
        let now = kst(2025, 3, 11, 2, 0);

        let f = evaluate(Some(kst(2025, 3, 10, 18, 10)), now, schedule, 5);
        assert!(f.fresh);
        assert_eq!(f.next_hour, 6);

        let f = evaluate(Some(kst(2025, 3, 10, 17, 0)), now, schedule, 5);
        assert!(!f.fresh);
    }

    #[test]
    fn test_late_evening_wraps_next_to_midnight() {
        let now = kst(2025, 3, 11, 23, 10);
        let f = evaluate(Some(kst(2025, 3, 11, 18, 30)), now, SCHEDULE, 5);
        assert!(f.fresh);
        assert_eq!(f.next_hour, 0);
    }

    #[test]
    fn test_missing_update_info() {
        let now = kst(2025, 3, 11, 19, 30);
        let f = evaluate(None, now, SCHEDULE, 5);
        assert!(!f.fresh);
        assert_eq!(f.last_label, "업데이트 정보 없음");
        assert_eq!(f.next_hour, 0);
    }

    #[test]
    fn test_age_labels() {
        let now = kst(2025, 3, 11, 19, 30);
        let f = evaluate(Some(kst(2025, 3, 11, 19, 18)), now, SCHEDULE, 5);
        assert_eq!(f.last_label, "12분 전");

        let f = evaluate(Some(kst(2025, 3, 11, 16, 30)), now, SCHEDULE, 5);
        assert_eq!(f.last_label, "3시간 전");

        let f = evaluate(Some(kst(2025, 3, 8, 6, 5)), now, SCHEDULE, 5);
        assert_eq!(f.last_label, "03/08 06:05");
    }

    #[test]
    fn test_invalid_hours_ignored() {
        let now = kst(2025, 3, 11, 19, 30);
        let f = evaluate(Some(kst(2025, 3, 11, 18, 10)), now, &[18, 99], 5);
        assert!(f.fresh);
        assert_eq!(f.next_hour, 18);
    }
}
