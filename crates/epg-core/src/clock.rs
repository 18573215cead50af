//! Reference-zone (KST, UTC+9) calendar and time-of-day helpers.
//!
//! All "today"/"tomorrow" math applies a fixed offset to a UTC instant and
//! never touches the host's local time zone, so results are identical on
//! any machine.

use chrono::{DateTime, Duration, FixedOffset, Timelike, Utc};
use regex::Regex;
use std::sync::OnceLock;

pub const KST_OFFSET_SECS: i32 = 9 * 3600;

pub fn reference_offset() -> FixedOffset {
    FixedOffset::east_opt(KST_OFFSET_SECS).expect("fixed KST offset is in range")
}

/// `YYYY-MM-DD` for the given instant, read in the reference zone.
pub fn today_reference_at(now: DateTime<Utc>) -> String {
    now.with_timezone(&reference_offset())
        .format("%Y-%m-%d")
        .to_string()
}

pub fn today_reference() -> String {
    today_reference_at(Utc::now())
}

pub fn tomorrow_reference_at(now: DateTime<Utc>) -> String {
    today_reference_at(now + Duration::days(1))
}

pub fn tomorrow_reference() -> String {
    tomorrow_reference_at(Utc::now())
}

/// `YYYY-MM-DD` → `YYYYMMDD`, the form the upstream API takes as a query
/// parameter.
pub fn compact_date(iso: &str) -> String {
    iso.replace('-', "")
}

/// Hour of day (0–23) for the given instant, read in the reference zone.
pub fn reference_hour_at(now: DateTime<Utc>) -> u32 {
    now.with_timezone(&reference_offset()).hour()
}

static TIME_RE: OnceLock<Regex> = OnceLock::new();
static COMPACT_RE: OnceLock<Regex> = OnceLock::new();

/// Normalize a raw time-of-day string to zero-padded `HH:MM`.
///
/// Accepts `H:MM`/`HH:MM` anywhere in the string, or a bare 4-digit
/// `HHMM`. Anything else (including out-of-range hours/minutes) is `None`.
pub fn parse_time_of_day(raw: &str) -> Option<String> {
    let re = TIME_RE.get_or_init(|| Regex::new(r"(\d{1,2}):(\d{2})").expect("valid time regex"));
    if let Some(caps) = re.captures(raw) {
        let h: u32 = caps[1].parse().ok()?;
        let m: u32 = caps[2].parse().ok()?;
        return canonical(h, m);
    }

    let compact =
        COMPACT_RE.get_or_init(|| Regex::new(r"^\d{4}$").expect("valid compact time regex"));
    let trimmed = raw.trim();
    if compact.is_match(trimmed) {
        let h: u32 = trimmed[..2].parse().ok()?;
        let m: u32 = trimmed[2..4].parse().ok()?;
        return canonical(h, m);
    }

    None
}

fn canonical(h: u32, m: u32) -> Option<String> {
    (h <= 23 && m <= 59).then(|| format!("{:02}:{:02}", h, m))
}

/// Minutes since midnight for a canonical `HH:MM` string.
pub fn time_to_minutes(hhmm: &str) -> Option<u32> {
    let (h, m) = hhmm.split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    (h <= 23 && m <= 59).then_some(h * 60 + m)
}

/// True iff `start` falls in `[window_start, window_end)` minutes since
/// midnight. The window does not wrap past midnight.
pub fn in_window(start: &str, window_start: u32, window_end: u32) -> bool {
    match time_to_minutes(start) {
        Some(m) => m >= window_start && m < window_end,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_today_is_kst_not_utc() {
        // 16:30 UTC is already the next day in KST (01:30 +1d)
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 16, 30, 0).unwrap();
        assert_eq!(today_reference_at(now), "2025-03-11");
        assert_eq!(tomorrow_reference_at(now), "2025-03-12");

        let morning = Utc.with_ymd_and_hms(2025, 3, 10, 2, 0, 0).unwrap();
        assert_eq!(today_reference_at(morning), "2025-03-10");
    }

    #[test]
    fn test_reference_hour() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 16, 30, 0).unwrap();
        assert_eq!(reference_hour_at(now), 1);
    }

    #[test]
    fn test_compact_date() {
        assert_eq!(compact_date("2025-03-11"), "20250311");
    }

    #[test]
    fn test_parse_time_of_day() {
        assert_eq!(parse_time_of_day("09:30").as_deref(), Some("09:30"));
        assert_eq!(parse_time_of_day("9:30").as_deref(), Some("09:30"));
        assert_eq!(parse_time_of_day("2145").as_deref(), Some("21:45"));
        assert_eq!(parse_time_of_day("930"), None);
        assert_eq!(parse_time_of_day(""), None);
        assert_eq!(parse_time_of_day("abc"), None);
        // embedded in a longer upstream string
        assert_eq!(parse_time_of_day("starts 21:30 KST").as_deref(), Some("21:30"));
        // out-of-range fields are invalid, not clamped
        assert_eq!(parse_time_of_day("24:00"), None);
        assert_eq!(parse_time_of_day("2460"), None);
    }

    #[test]
    fn test_time_to_minutes() {
        assert_eq!(time_to_minutes("21:30"), Some(1290));
        assert_eq!(time_to_minutes("00:00"), Some(0));
        assert_eq!(time_to_minutes("24:00"), None);
        assert_eq!(time_to_minutes("garbage"), None);
    }

    #[test]
    fn test_window_boundaries() {
        // [21:30, 22:00)
        assert!(!in_window("21:29", 1290, 1320));
        assert!(in_window("21:30", 1290, 1320));
        assert!(in_window("21:59", 1290, 1320));
        assert!(!in_window("22:00", 1290, 1320));
        assert!(!in_window("", 1290, 1320));
    }
}
