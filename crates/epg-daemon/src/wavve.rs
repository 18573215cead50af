//! Client for the Wavve live EPG API: the channel directory and
//! per-channel daily schedules.
//!
//! Payloads are only loosely typed upstream, so responses are walked as
//! `serde_json::Value` and normalized immediately.

use reqwest::{Client, Url};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use epg_core::clock;
use epg_core::config::SourceConfig;
use epg_core::schedule::{self, ScheduleEntry};

use crate::error::UpstreamError;
use crate::proxy::{self, Strategy};

/// Query parameters every API call carries.
const BASE_PARAMS: &[(&str, &str)] = &[
    ("credential", "none"),
    ("device", "mobile"),
    ("drm", "none"),
    ("formattype", "json"),
    ("partnerId", "P-CH"),
    ("prdtype", "2"),
];

fn api_url(
    source: &SourceConfig,
    path: &str,
    extra: &[(&str, &str)],
) -> Result<Url, UpstreamError> {
    let mut params: Vec<(&str, &str)> = vec![("apikey", source.api_key.as_str())];
    params.extend_from_slice(BASE_PARAMS);
    params.extend_from_slice(extra);
    let endpoint = format!("{}/{}", source.api_base.trim_end_matches('/'), path);
    Url::parse_with_params(&endpoint, &params)
        .map_err(|e| UpstreamError::InvalidUrl(e.to_string()))
}

/// The item list lives under `data.items` or bare `items` depending on
/// endpoint version.
pub fn extract_items(body: &Value) -> Vec<Value> {
    body.pointer("/data/items")
        .or_else(|| body.get("items"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Live channel directory: code → display name.
pub async fn fetch_channel_map(
    client: &Client,
    strategies: &[Strategy],
    source: &SourceConfig,
    attempt_timeout: Duration,
) -> Result<BTreeMap<String, String>, UpstreamError> {
    let url = api_url(source, "live/channels", &[])?;
    let body = proxy::get_json(client, strategies, url.as_str(), attempt_timeout).await?;

    let mut map = BTreeMap::new();
    for channel in extract_items(&body) {
        let code = schedule::first_text(&channel, &["channelcode", "channel_code"]);
        let name = schedule::first_text(&channel, &["channelname", "channel_name"]);
        if let (Some(code), Some(name)) = (code, name) {
            map.insert(code.to_string(), name.to_string());
        }
    }
    Ok(map)
}

/// Static channel directory used when the live lookup fails or comes
/// back empty.
pub fn fallback_channel_map() -> BTreeMap<String, String> {
    [
        ("KBS1", "KBS1"),
        ("KBS2", "KBS2"),
        ("MBC", "MBC"),
        ("SBS", "SBS"),
        ("C01", "tvN"),
        ("C23", "OCN"),
        ("OCN_MOVIES", "OCN Movies"),
        ("CGV", "CGV"),
        ("CH_CGV", "채널CGV"),
    ]
    .iter()
    .map(|(code, name)| (code.to_string(), name.to_string()))
    .collect()
}

/// One channel's schedule for one broadcast day, normalized. Records
/// without a parseable start time are dropped here.
pub async fn fetch_channel_day(
    client: &Client,
    strategies: &[Strategy],
    source: &SourceConfig,
    code: &str,
    name: &str,
    date_iso: &str,
    genre_noise: &[String],
    attempt_timeout: Duration,
) -> Result<Vec<ScheduleEntry>, UpstreamError> {
    let compact = clock::compact_date(date_iso);
    let url = api_url(
        source,
        "live/epgs",
        &[
            ("limit", "500"),
            ("offset", "0"),
            ("startdate", compact.as_str()),
            ("enddate", compact.as_str()),
            ("channelcode", code),
        ],
    )?;
    let body = proxy::get_json(client, strategies, url.as_str(), attempt_timeout).await?;

    Ok(extract_items(&body)
        .iter()
        .filter_map(|item| schedule::normalize(item, name, date_iso, genre_noise))
        .collect())
}
