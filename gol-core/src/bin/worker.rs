//! Worker service binary

use gol_core::runtime::ShutdownSignal;
use gol_core::worker::{WorkerConfig, WorkerService};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting GoL Worker (protocol v{})", gol_core::PROTOCOL_VERSION);

    let bind_addr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| format!("0.0.0.0:{}", gol_core::DEFAULT_WORKER_PORT));
    let name = std::env::var("WORKER_NAME").unwrap_or_else(|_| bind_addr.clone());

    let config = WorkerConfig::default();
    let shutdown = ShutdownSignal::new();
    let (service, control_loop) = WorkerService::spawn(name, &config, shutdown.clone());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Worker listening on {}", bind_addr);

    service.serve(listener, shutdown).await?;

    // Closed by the coordinator; give the close reply time to flush
    info!("Worker closed, exiting in {:?}", config.shutdown_grace);
    tokio::time::sleep(config.shutdown_grace).await;
    control_loop.abort();

    Ok(())
}
