//! Failure taxonomy for the upstream fetch path.
//!
//! Per-channel failures are logged and contribute nothing to a batch;
//! only a whole-request failure (every strategy exhausted, or the single
//! static document unreachable) surfaces to the API consumer.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("malformed upstream payload: {0}")]
    Malformed(String),

    #[error("all {0} request strategies exhausted")]
    StrategiesExhausted(usize),
}
