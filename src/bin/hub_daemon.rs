use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bayanihub::api::{build_router, AppState};
use bayanihub::config::Config;
use bayanihub::{HubService, SqliteAlertStore};

/// Hub daemon entry point: serves the ingestion, list, metrics and health API
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    log::info!("Starting BayaniHub hub...");

    // Load configuration
    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));
    let config = Config::load_or_default(&config_path)?;

    // The store handle is owned here and shared with every component
    let store = Arc::new(SqliteAlertStore::new(&config.storage.db_path)?);
    log::info!("Database: {:?}", config.storage.db_path);

    let hub = Arc::new(HubService::from_config(store, &config));
    let state = AppState::new(
        hub,
        Duration::from_secs(config.server.request_timeout_secs.max(1)),
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    log::info!("Listening on http://{}", config.server.bind_address);
    log::info!(
        "Correlation window: {}s. Press Ctrl+C to stop.",
        config.correlation.window_seconds
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("BayaniHub hub stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("Received shutdown signal, gracefully stopping..."),
        Err(e) => log::error!("Failed to listen for shutdown signal: {}", e),
    }
}
