//! Canonical schedule entries and normalization of raw upstream records.
//!
//! Upstream EPG payloads are loosely shaped: field names vary between
//! spellings (`starttime` / `start_time`), values arrive as strings or
//! numbers, and most fields may be missing. `normalize` is total over
//! arbitrary JSON — it either produces a best-effort entry or rejects the
//! record, never panics.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock;

/// Placeholder title when upstream has none.
pub const NO_TITLE: &str = "(제목 없음)";

pub const START_KEYS: &[&str] = &["starttime", "start_time"];
pub const END_KEYS: &[&str] = &["endtime", "end_time"];
pub const TITLE_KEYS: &[&str] = &["title", "program_name"];
pub const PLOT_KEYS: &[&str] = &["synopsis", "description"];
pub const RATING_KEYS: &[&str] = &["ratings", "age"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Broadcast day, `YYYY-MM-DD` in the reference zone.
    pub date: String,
    pub channel: String,
    /// Always canonical `HH:MM`.
    pub start: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    pub title: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(rename = "runtimeMin", default, skip_serializing_if = "Option::is_none")]
    pub runtime_min: Option<u32>,
    #[serde(rename = "age", default)]
    pub age_rating: String,
    #[serde(default)]
    pub plot: String,
}

/// First alias that holds a non-empty string. Shared by every call site
/// that reads loosely-named upstream fields.
pub fn first_text<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| raw.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// Like `first_text`, but numbers count too (stringified). Rating and
/// runtime fields arrive as either.
fn first_scalar(raw: &Value, keys: &[&str]) -> Option<String> {
    for k in keys {
        match raw.get(*k) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// Map free-form upstream rating text onto the closed label set.
/// Unrecognized text passes through as-is.
pub fn normalize_age_rating(raw: &str) -> String {
    let trimmed = raw.trim();
    let lower = trimmed.to_lowercase();
    if lower.contains("19") || lower.contains("adult") {
        return "19세".to_string();
    }
    if lower.contains("15") {
        return "15세".to_string();
    }
    if lower.contains("12") {
        return "12세".to_string();
    }
    if lower.contains('7') || lower.contains("all") || trimmed == "0" {
        return "전체".to_string();
    }
    trimmed.to_string()
}

/// Wrap-aware duration in minutes; crossing midnight adds a day.
/// Zero or unparseable endpoints are unknown.
fn derive_runtime(start: &str, end: Option<&str>) -> Option<u32> {
    let s = clock::time_to_minutes(start)?;
    let e = clock::time_to_minutes(end?)?;
    let diff = if e >= s { e - s } else { e + 1440 - s };
    (diff > 0).then_some(diff)
}

/// Map one raw upstream record to a canonical entry.
///
/// Returns `None` only when no start time can be parsed — the sole hard
/// validation rule. Everything else degrades to placeholders or absence.
pub fn normalize(
    raw: &Value,
    channel: &str,
    date: &str,
    genre_noise: &[String],
) -> Option<ScheduleEntry> {
    let start = clock::parse_time_of_day(first_text(raw, START_KEYS).unwrap_or(""))?;
    let end = first_text(raw, END_KEYS).and_then(|s| clock::parse_time_of_day(s));

    let title = first_text(raw, TITLE_KEYS).unwrap_or(NO_TITLE).to_string();

    let mut genres: Vec<String> = Vec::new();
    let primary = first_text(raw, &["category_name"]);
    for candidate in [primary, first_text(raw, &["genre"])].into_iter().flatten() {
        if genre_noise.iter().any(|n| n == candidate) {
            continue;
        }
        if genres.iter().any(|g| g == candidate) {
            continue;
        }
        genres.push(candidate.to_string());
    }
    genres.truncate(2);

    let runtime_min = first_scalar(raw, &["runtime"])
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|n| *n > 0)
        .or_else(|| derive_runtime(&start, end.as_deref()));

    let age_rating = normalize_age_rating(&first_scalar(raw, RATING_KEYS).unwrap_or_default());

    let plot = first_text(raw, PLOT_KEYS).unwrap_or("").to_string();

    Some(ScheduleEntry {
        date: date.to_string(),
        channel: channel.to_string(),
        start,
        end,
        title,
        genres,
        runtime_min,
        age_rating,
        plot,
    })
}

/// Batch stage: keep in-window entries, order ascending by start time.
/// Lexicographic compare is correct on zero-padded `HH:MM`.
pub fn filter_and_sort(
    mut entries: Vec<ScheduleEntry>,
    window_start: u32,
    window_end: u32,
) -> Vec<ScheduleEntry> {
    entries.retain(|e| clock::in_window(&e.start, window_start, window_end));
    entries.sort_by(|a, b| a.start.cmp(&b.start));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noise() -> Vec<String> {
        vec!["Movie / Drama".to_string()]
    }

    #[test]
    fn test_unparseable_start_drops_record() {
        let raw = json!({"starttime": "abc", "title": "Film"});
        assert!(normalize(&raw, "OCN", "2025-03-11", &noise()).is_none());
        let raw = json!({"title": "Film"});
        assert!(normalize(&raw, "OCN", "2025-03-11", &noise()).is_none());
    }

    #[test]
    fn test_field_aliases() {
        let raw = json!({
            "start_time": "2130",
            "end_time": "23:00",
            "program_name": "주말의 명화",
            "description": "줄거리",
        });
        let entry = normalize(&raw, "KBS2", "2025-03-11", &noise()).unwrap();
        assert_eq!(entry.start, "21:30");
        assert_eq!(entry.end.as_deref(), Some("23:00"));
        assert_eq!(entry.title, "주말의 명화");
        assert_eq!(entry.plot, "줄거리");
    }

    #[test]
    fn test_title_placeholder() {
        let raw = json!({"starttime": "21:30", "title": "  "});
        let entry = normalize(&raw, "MBC", "2025-03-11", &noise()).unwrap();
        assert_eq!(entry.title, NO_TITLE);
    }

    #[test]
    fn test_genres_dedup_and_noise() {
        let raw = json!({
            "starttime": "21:40",
            "category_name": "Movie / Drama",
            "genre": "스릴러",
        });
        let entry = normalize(&raw, "OCN", "2025-03-11", &noise()).unwrap();
        assert_eq!(entry.genres, vec!["스릴러"]);

        let raw = json!({
            "starttime": "21:40",
            "category_name": "액션",
            "genre": "액션",
        });
        let entry = normalize(&raw, "OCN", "2025-03-11", &noise()).unwrap();
        assert_eq!(entry.genres, vec!["액션"]);
    }

    #[test]
    fn test_runtime_prefers_explicit_field() {
        let raw = json!({"starttime": "21:30", "endtime": "22:00", "runtime": "125"});
        let entry = normalize(&raw, "CGV", "2025-03-11", &noise()).unwrap();
        assert_eq!(entry.runtime_min, Some(125));

        let raw = json!({"starttime": "21:30", "endtime": "22:00", "runtime": 95});
        let entry = normalize(&raw, "CGV", "2025-03-11", &noise()).unwrap();
        assert_eq!(entry.runtime_min, Some(95));
    }

    #[test]
    fn test_runtime_wraps_past_midnight() {
        let raw = json!({"starttime": "23:50", "endtime": "00:20"});
        let entry = normalize(&raw, "CGV", "2025-03-11", &noise()).unwrap();
        assert_eq!(entry.runtime_min, Some(30));
    }

    #[test]
    fn test_runtime_zero_is_unknown() {
        let raw = json!({"starttime": "21:30", "endtime": "21:30"});
        let entry = normalize(&raw, "CGV", "2025-03-11", &noise()).unwrap();
        assert_eq!(entry.runtime_min, None);

        let raw = json!({"starttime": "21:30"});
        let entry = normalize(&raw, "CGV", "2025-03-11", &noise()).unwrap();
        assert_eq!(entry.runtime_min, None);
    }

    #[test]
    fn test_age_rating_table() {
        assert_eq!(normalize_age_rating("청소년관람불가(19)"), "19세");
        assert_eq!(normalize_age_rating("Adult"), "19세");
        assert_eq!(normalize_age_rating("15세 이상"), "15세");
        assert_eq!(normalize_age_rating("12"), "12세");
        assert_eq!(normalize_age_rating("ALL"), "전체");
        assert_eq!(normalize_age_rating("0"), "전체");
        assert_eq!(normalize_age_rating("7세"), "전체");
        assert_eq!(normalize_age_rating("미정"), "미정");
        assert_eq!(normalize_age_rating(""), "");
    }

    #[test]
    fn test_rating_accepts_numeric_field() {
        let raw = json!({"starttime": "21:30", "ratings": 15});
        let entry = normalize(&raw, "SBS", "2025-03-11", &noise()).unwrap();
        assert_eq!(entry.age_rating, "15세");

        let raw = json!({"starttime": "21:30", "age": "19"});
        let entry = normalize(&raw, "SBS", "2025-03-11", &noise()).unwrap();
        assert_eq!(entry.age_rating, "19세");
    }

    #[test]
    fn test_normalize_is_pure() {
        let raw = json!({
            "starttime": "21:45",
            "endtime": "23:40",
            "title": "영화",
            "category_name": "영화",
            "ratings": "15",
        });
        let a = normalize(&raw, "tvN", "2025-03-11", &noise()).unwrap();
        let b = normalize(&raw, "tvN", "2025-03-11", &noise()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_filter_and_sort() {
        let mk = |start: &str| ScheduleEntry {
            date: "2025-03-11".to_string(),
            channel: "OCN".to_string(),
            start: start.to_string(),
            end: None,
            title: "t".to_string(),
            genres: vec![],
            runtime_min: None,
            age_rating: String::new(),
            plot: String::new(),
        };
        let out = filter_and_sort(
            vec![mk("22:00"), mk("21:59"), mk("21:30"), mk("21:29")],
            1290,
            1320,
        );
        let starts: Vec<&str> = out.iter().map(|e| e.start.as_str()).collect();
        assert_eq!(starts, vec!["21:30", "21:59"]);
    }
}
