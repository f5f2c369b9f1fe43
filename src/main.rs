//! edge-ssr server binary.
//!
//! Configuration comes from the TOML file named by `APP_CONFIG` (optional)
//! plus environment overrides.

use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::net::TcpListener;

use edge_ssr::config::load_config;
use edge_ssr::lifecycle::{wait_for_shutdown_signal, Shutdown};
use edge_ssr::observability::{logging, metrics};
use edge_ssr::HttpServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var_os("APP_CONFIG").map(PathBuf::from);
    let config = load_config(config_path.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!("edge-ssr v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        environment = ?config.environment,
        provider_url = %config.auth.provider_url,
        stream_timeout_ms = config.render.stream_timeout_ms,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(err) = metrics::init_metrics(addr) {
                    tracing::error!(error = %err, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        shutdown.trigger();
    });

    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
