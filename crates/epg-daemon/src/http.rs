//! HTTP API for the front-end: schedule payload, freshness report,
//! per-title enrichment, and a manual refresh trigger. CORS is left
//! permissive — the consumer is a static web page served from elsewhere.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use epg_core::cache::{CacheRead, CacheSnapshot, SnapshotStore};
use epg_core::config::Config;
use epg_core::freshness::{self, Freshness};

use crate::error::UpstreamError;
use crate::fetch::{self, EpgPayload};
use crate::tmdb::{MovieInfo, TmdbClient};

pub struct AppState {
    pub config: Config,
    pub client: Client,
    pub store: SnapshotStore,
    pub tmdb: TmdbClient,
    /// Last known snapshot regardless of TTL — the freshness endpoint
    /// reports on whatever is being displayed.
    pub snapshot: RwLock<Option<CacheSnapshot>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let client = build_client();
        let store = SnapshotStore::new(
            config.cache.snapshot_file.clone(),
            config.cache.ttl_minutes,
        );
        let tmdb = TmdbClient::new(client.clone(), config.tmdb.clone());
        Self {
            config,
            client,
            store,
            tmdb,
            snapshot: RwLock::new(None),
        }
    }
}

/// The upstream rejects anonymous clients; present the headers its own
/// web player sends.
fn build_client() -> Client {
    let mut headers = HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        reqwest::header::ORIGIN,
        HeaderValue::from_static("https://www.wavve.com"),
    );
    headers.insert(
        reqwest::header::REFERER,
        HeaderValue::from_static("https://www.wavve.com/"),
    );
    Client::builder()
        .user_agent(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15",
        )
        .default_headers(headers)
        .build()
        .expect("failed to build reqwest client")
}

/// Serve the cached snapshot while valid; otherwise run the full fetch
/// path, persist the result, and keep an in-memory copy either way.
pub async fn load_or_fetch(state: &AppState, force: bool) -> Result<EpgPayload, UpstreamError> {
    if !force {
        if let CacheRead::Hit(snapshot) = state.store.load() {
            info!("serving {} entries from cache", snapshot.items.len());
            let payload = EpgPayload {
                items: snapshot.items.clone(),
                updated_at: snapshot.updated_at,
            };
            *state.snapshot.write().await = Some(snapshot);
            return Ok(payload);
        }
    }

    let payload = fetch::fetch_epg(&state.client, &state.config).await?;

    let snapshot = state
        .store
        .stamp(payload.items.clone(), payload.updated_at);
    if let Err(e) = state.store.persist(&snapshot) {
        warn!("snapshot write failed (continuing in memory): {}", e);
    }
    *state.snapshot.write().await = Some(snapshot);

    Ok(payload)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/schedule", get(get_schedule))
        .route("/api/refresh", post(post_refresh))
        .route("/api/freshness", get(get_freshness))
        .route("/api/movie/:title", get(get_movie))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub fn start_server(
    bind_address: String,
    port: u16,
    state: Arc<AppState>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(state);
        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("EPG API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

fn upstream_failure(e: UpstreamError) -> (StatusCode, String) {
    (StatusCode::BAD_GATEWAY, e.to_string())
}

async fn get_schedule(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EpgPayload>, (StatusCode, String)> {
    load_or_fetch(&state, false)
        .await
        .map(Json)
        .map_err(upstream_failure)
}

async fn post_refresh(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EpgPayload>, (StatusCode, String)> {
    info!("manual refresh requested");
    load_or_fetch(&state, true)
        .await
        .map(Json)
        .map_err(upstream_failure)
}

#[derive(Serialize)]
struct FreshnessResponse {
    #[serde(flatten)]
    freshness: Freshness,
    #[serde(rename = "fetchedAt", skip_serializing_if = "Option::is_none")]
    fetched_at: Option<DateTime<Utc>>,
}

async fn get_freshness(State(state): State<Arc<AppState>>) -> Json<FreshnessResponse> {
    let snapshot = state.snapshot.read().await.clone();
    let updated_at = snapshot.as_ref().and_then(|s| s.updated_at);
    let freshness = freshness::evaluate(
        updated_at,
        Utc::now(),
        &state.config.sane_update_hours(),
        state.config.schedule.grace_min,
    );
    Json(FreshnessResponse {
        freshness,
        fetched_at: snapshot.map(|s| s.fetched_at),
    })
}

#[derive(Serialize)]
struct MovieResponse {
    #[serde(flatten)]
    info: MovieInfo,
    #[serde(rename = "posterUrl", skip_serializing_if = "Option::is_none")]
    poster_url: Option<String>,
}

async fn get_movie(
    Path(title): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<MovieResponse>, StatusCode> {
    match state.tmdb.lookup(&title).await {
        Some(info) => {
            let poster_url = state.tmdb.poster_url(&info);
            Ok(Json(MovieResponse { info, poster_url }))
        }
        None => Err(StatusCode::NOT_FOUND),
    }
}
