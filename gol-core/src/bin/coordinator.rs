//! Coordinator service binary

use gol_core::coordinator::{Coordinator, CoordinatorConfig};
use gol_core::runtime::ShutdownSignal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, error, warn};
use tracing_subscriber::EnvFilter;
use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;

fn env_millis(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting GoL Coordinator (protocol v{})", gol_core::PROTOCOL_VERSION);

    // Load configuration from environment
    let bind_addr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| format!("0.0.0.0:{}", gol_core::DEFAULT_COORDINATOR_PORT));
    let metrics_addr = std::env::var("METRICS_ADDR")
        .unwrap_or_else(|_| format!("0.0.0.0:{}", gol_core::DEFAULT_METRICS_PORT));
    let worker_addrs: Vec<String> = std::env::var("WORKER_ADDRS")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(String::from)
        .collect();

    let defaults = CoordinatorConfig::default();
    let config = CoordinatorConfig {
        report_interval: env_millis("REPORT_INTERVAL_MS").unwrap_or(defaults.report_interval),
        round_timeout: env_millis("ROUND_TIMEOUT_MS"),
        ..defaults
    };
    let grace = config.shutdown_grace;

    let shutdown = ShutdownSignal::new();
    let coordinator = Arc::new(Coordinator::new(config, shutdown.clone()));

    // Dial the configured workers
    for addr in &worker_addrs {
        match coordinator.register_worker(addr).await {
            Ok(worker_id) => info!("Worker {} registered as {}", addr, worker_id),
            Err(e) => {
                error!("Failed to register worker {}: {}", addr, e);
                return Err(e.into());
            }
        }
    }

    // Start Metrics API Server
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr).await?;
    let metrics_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let app = Router::new()
            .route("/metrics", get(|| async { gol_core::metrics::gather_system_metrics() }))
            .layer(CorsLayer::permissive());

        info!("Metrics API listening on {}", metrics_addr);

        let server = axum::serve(metrics_listener, app)
            .with_graceful_shutdown(async move { metrics_shutdown.wait().await });
        if let Err(e) = server.await {
            warn!("Metrics server error: {}", e);
        }
    });

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Coordinator listening on {}", bind_addr);

    coordinator.serve(listener).await?;

    // Let the closing run's final reply reach the client
    info!("Coordinator closed, exiting in {:?}", grace);
    tokio::time::sleep(grace).await;

    Ok(())
}
