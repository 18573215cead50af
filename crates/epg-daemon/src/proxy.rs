//! Request indirection strategies and the try-in-order driver.
//!
//! Direct access to the upstream host is not always possible (browser
//! consumers sit behind CORS and lean on public relay gateways). A
//! strategy is a pure description of how to wrap a
//! target URL; the driver walks the configured list, advancing on
//! timeout, transport error, non-2xx, or an unparseable body, and fails
//! the request only after every strategy has been tried. Each attempt is
//! individually bounded, so a request costs at most
//! `strategies × attempt_timeout`.

use reqwest::{Client, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use epg_core::config::ProxyConfig;

use crate::error::UpstreamError;

#[derive(Debug, Clone)]
pub enum Strategy {
    /// Hit the target URL as-is.
    Direct,
    /// Relay through a gateway that takes the target as a `url` query
    /// parameter.
    Gateway { base: String },
}

impl Strategy {
    pub fn label(&self) -> &str {
        match self {
            Strategy::Direct => "direct",
            Strategy::Gateway { base } => base.as_str(),
        }
    }

    /// The URL this strategy actually requests for `target`.
    pub fn build_url(&self, target: &str) -> Result<Url, UpstreamError> {
        match self {
            Strategy::Direct => {
                Url::parse(target).map_err(|e| UpstreamError::InvalidUrl(e.to_string()))
            }
            Strategy::Gateway { base } => Url::parse_with_params(base, &[("url", target)])
                .map_err(|e| UpstreamError::InvalidUrl(e.to_string())),
        }
    }
}

/// The ordered strategy list for this configuration: always direct first,
/// relay gateways appended when enabled.
pub fn strategies(config: &ProxyConfig) -> Vec<Strategy> {
    let mut list = vec![Strategy::Direct];
    if config.enabled {
        list.extend(
            config
                .gateways
                .iter()
                .map(|base| Strategy::Gateway { base: base.clone() }),
        );
    }
    list
}

/// GET `target` as JSON, walking the strategy list in order.
pub async fn get_json(
    client: &Client,
    strategies: &[Strategy],
    target: &str,
    attempt_timeout: Duration,
) -> Result<Value, UpstreamError> {
    for strategy in strategies {
        let url = match strategy.build_url(target) {
            Ok(url) => url,
            Err(e) => {
                warn!("strategy {}: unusable for {}: {}", strategy.label(), target, e);
                continue;
            }
        };

        match attempt(client, url, attempt_timeout).await {
            Ok(value) => {
                debug!("strategy {}: ok for {}", strategy.label(), target);
                return Ok(value);
            }
            Err(e) => {
                warn!("strategy {}: failed for {}: {}", strategy.label(), target, e);
            }
        }
    }

    Err(UpstreamError::StrategiesExhausted(strategies.len()))
}

async fn attempt(
    client: &Client,
    url: Url,
    attempt_timeout: Duration,
) -> Result<Value, UpstreamError> {
    let response = tokio::time::timeout(attempt_timeout, client.get(url).send())
        .await
        .map_err(|_| UpstreamError::Timeout(attempt_timeout))??;

    if !response.status().is_success() {
        return Err(UpstreamError::Status(response.status()));
    }

    tokio::time::timeout(attempt_timeout, response.json::<Value>())
        .await
        .map_err(|_| UpstreamError::Timeout(attempt_timeout))?
        .map_err(|e| UpstreamError::Malformed(e.to_string()))
}
