// Main entry point - Dependency injection, collector task, and read API
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{Router, routing::get};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::application::collector::Collector;
use crate::application::query_service::QueryService;
use crate::application::registry;
use crate::infrastructure::config::{load_detector_list, load_monitor_config};
use crate::infrastructure::device_client::HttpDeviceClient;
use crate::infrastructure::sqlite_store::SqliteStore;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    find_detectors, get_current, get_detector, get_voltage, health_check, list_detectors,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Load configuration
    let config = load_monitor_config()?;
    let configured_detectors = load_detector_list(&config.collector.detector_list)?;

    // Open the store and reconcile the detector registry. A reconciliation
    // failure is fatal: collection must not start with an unreconciled set.
    let store = Arc::new(SqliteStore::open(std::path::Path::new(&config.storage.path))?);
    registry::reconcile(store.as_ref(), &configured_detectors).await?;

    // Spawn the collector
    let device = Arc::new(HttpDeviceClient::new(&config.controller)?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let collector = Collector::new(
        device,
        store.clone(),
        Duration::from_secs(config.collector.interval_secs),
        shutdown_rx,
    );
    let collector_task = tokio::spawn(collector.run());

    // Build the read API router
    let state = Arc::new(AppState {
        query_service: QueryService::new(store),
    });
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/detectors/", get(list_detectors))
        .route("/detector/", get(find_detectors))
        .route("/detector/:id", get(get_detector))
        .route("/voltage/:id", get(get_voltage))
        .route("/current/:id", get(get_current))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config.api.bind.parse()?;
    tracing::info!(%addr, "starting hv-telemetry read api");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the collector between cycles and wait for it to drain.
    let _ = shutdown_tx.send(true);
    collector_task.await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install ctrl-c handler");
    }
}
