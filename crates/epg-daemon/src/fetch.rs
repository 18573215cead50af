//! Fetch orchestration.
//!
//! One entry point, `fetch_epg`, serves both source kinds behind the same
//! `{items, updatedAt}` payload: per-channel fan-out against the live API,
//! or a single pre-generated JSON document. Per-channel requests run
//! concurrently and settle independently — a failed channel contributes
//! nothing and never aborts the batch.

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

use epg_core::clock;
use epg_core::config::{Config, SourceKind};
use epg_core::schedule::{self, ScheduleEntry};

use crate::error::UpstreamError;
use crate::proxy::{self, Strategy};
use crate::wavve;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpgPayload {
    pub items: Vec<ScheduleEntry>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

pub async fn fetch_epg(client: &Client, config: &Config) -> Result<EpgPayload, UpstreamError> {
    match config.source.kind {
        SourceKind::Static => fetch_static(client, config).await,
        SourceKind::Wavve => {
            let items = fetch_all_entries(client, config).await?;
            // the per-channel API reports no generation timestamp
            Ok(EpgPayload {
                items,
                updated_at: None,
            })
        }
    }
}

/// Full per-channel fan-out: resolve the channel directory, keep the
/// allow-listed channels, fetch each day × channel concurrently, settle,
/// then window-filter and order.
pub async fn fetch_all_entries(
    client: &Client,
    config: &Config,
) -> Result<Vec<ScheduleEntry>, UpstreamError> {
    let strategies = proxy::strategies(&config.proxy);
    let attempt_timeout = Duration::from_secs(config.proxy.attempt_timeout_secs);

    let channel_map =
        match wavve::fetch_channel_map(client, &strategies, &config.source, attempt_timeout).await
        {
            Ok(map) if !map.is_empty() => map,
            Ok(_) => {
                warn!("channel directory came back empty; using fallback table");
                wavve::fallback_channel_map()
            }
            Err(e) => {
                warn!("channel directory lookup failed ({}); using fallback table", e);
                wavve::fallback_channel_map()
            }
        };

    let targets: Vec<(String, String)> = channel_map
        .into_iter()
        .filter(|(_, name)| config.schedule.target_channels.iter().any(|t| t == name))
        .collect();

    let mut dates = vec![clock::today_reference()];
    if config.source.include_tomorrow {
        dates.push(clock::tomorrow_reference());
    }
    info!("fetching {} channels over {} day(s)", targets.len(), dates.len());

    let mut requests = Vec::new();
    for date in &dates {
        for (code, name) in &targets {
            requests.push(fetch_one(
                client,
                &strategies,
                config,
                code,
                name,
                date,
                attempt_timeout,
            ));
        }
    }

    let items = settle(join_all(requests).await);
    let items = schedule::filter_and_sort(
        items,
        config.schedule.window_start,
        config.schedule.window_end,
    );
    Ok(order_for_display(items))
}

async fn fetch_one(
    client: &Client,
    strategies: &[Strategy],
    config: &Config,
    code: &str,
    name: &str,
    date: &str,
    attempt_timeout: Duration,
) -> (String, String, Result<Vec<ScheduleEntry>, UpstreamError>) {
    let result = wavve::fetch_channel_day(
        client,
        strategies,
        &config.source,
        code,
        name,
        date,
        &config.schedule.genre_noise,
        attempt_timeout,
    )
    .await;
    (name.to_string(), date.to_string(), result)
}

/// Settle-all: successes are flattened, failures are logged away.
fn settle(
    results: Vec<(String, String, Result<Vec<ScheduleEntry>, UpstreamError>)>,
) -> Vec<ScheduleEntry> {
    let mut items = Vec::new();
    let mut failed = 0usize;
    for (channel, date, result) in results {
        match result {
            Ok(mut batch) => items.append(&mut batch),
            Err(e) => {
                failed += 1;
                warn!("channel {} ({}): {}", channel, date, e);
            }
        }
    }
    if failed > 0 {
        info!("{} channel request(s) failed; continuing with partial data", failed);
    }
    items
}

/// Broadcast day first, start time second.
fn order_for_display(mut entries: Vec<ScheduleEntry>) -> Vec<ScheduleEntry> {
    entries.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.start.cmp(&b.start)));
    entries
}

/// Single pre-generated `{items, updatedAt}` document. The generator has
/// already applied the window filter; unreadable items are dropped one by
/// one rather than failing the document.
async fn fetch_static(client: &Client, config: &Config) -> Result<EpgPayload, UpstreamError> {
    let strategies = proxy::strategies(&config.proxy);
    let attempt_timeout = Duration::from_secs(config.proxy.attempt_timeout_secs);
    let body = proxy::get_json(client, &strategies, &config.source.data_url, attempt_timeout).await?;

    let raw_items = match body.get("items").and_then(Value::as_array) {
        Some(raw) => raw.clone(),
        None => {
            warn!("static document has no items array");
            Vec::new()
        }
    };

    let mut items = Vec::new();
    for raw in raw_items {
        match serde_json::from_value::<ScheduleEntry>(raw) {
            Ok(entry) => items.push(entry),
            Err(e) => warn!("skipping unreadable static item: {}", e),
        }
    }

    let updated_at = body
        .get("updatedAt")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(EpgPayload {
        items: order_for_display(items),
        updated_at,
    })
}
