// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::application::fleet_view_service::FleetViewService;
use crate::application::ingestion::{IngestionController, InitialLoad};
use crate::application::snapshot_store::SnapshotStore;
use crate::infrastructure::config::load_dashboard_config;
use crate::infrastructure::http_source::HttpTelemetrySource;
use crate::presentation::app_state::AppState;
use crate::presentation::routes::router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_dashboard_config()?;

    // Telemetry backend adapter (infrastructure layer)
    let source = Arc::new(HttpTelemetrySource::new(&config.source)?);
    tracing::info!(
        "Telemetry source: {} (updates via {})",
        source.robots_url(),
        source.updates_url()
    );

    // Fleet state and services (application layer)
    let store = SnapshotStore::new();
    let ingestion = Arc::new(IngestionController::new(
        source,
        store.clone(),
        config.source.reconnect_policy(),
    ));
    let view_service = FleetViewService::new(
        store,
        config.dashboard.default_filter(),
        config.dashboard.stream_buffer,
    );

    // Serve immediately; the initial load completes in the background
    let startup = ingestion.clone();
    tokio::spawn(async move {
        match startup.start().await {
            Ok(InitialLoad::Loaded { robots, rejected }) => {
                tracing::info!("Dashboard live with {} robots ({} rejected)", robots, rejected)
            }
            Ok(InitialLoad::Failed { reason }) => {
                tracing::warn!("Dashboard starting with an empty fleet: {}", reason)
            }
            Err(e) => tracing::warn!("Ingestion not started: {}", e),
        }
    });

    let state = Arc::new(AppState {
        view_service,
        ingestion,
    });

    // Start server
    let addr: SocketAddr = config
        .server
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address {}", config.server.listen_addr))?;
    tracing::info!("Starting fleet-dashboard service on {}", addr);

    let teardown = state.clone();
    axum::serve(tokio::net::TcpListener::bind(addr).await?, router(state))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
            teardown.shutdown();
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
