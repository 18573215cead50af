mod error;
mod fetch;
mod http;
mod proxy;
mod tmdb;
mod wavve;

use std::sync::Arc;

use epg_core::config::Config;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // File logging next to the snapshot data
    let data_dir = epg_core::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("daemon.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,epg_daemon=debug")),
        )
        .init();

    info!("Log file: {:?}", log_path);

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    let state = Arc::new(http::AppState::new(config.clone()));

    if !config.http.enabled {
        // One-shot mode: emit the payload on stdout and exit. Useful for
        // generating a static data.json out of the same pipeline.
        let payload = http::load_or_fetch(&state, false).await?;
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    // Warm the snapshot before serving. A failed first fetch is not
    // fatal — the API surfaces the error and the consumer retries.
    match http::load_or_fetch(&state, false).await {
        Ok(payload) => info!("schedule ready: {} entries", payload.items.len()),
        Err(e) => warn!("initial fetch failed: {}", e),
    }

    let server = http::start_server(config.http.bind_address.clone(), config.http.port, state);
    server.await?;

    Ok(())
}
