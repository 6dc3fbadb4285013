//! binlevel server binary.
//!
//! Accepts fill-level telemetry from bin sensors and stores it.

use anyhow::Result;
use binlevel_core::IngestionService;
use binlevel_server::{BinlevelConfig, router, store};
use reqwest::Client;
use tokio::{net::TcpListener, signal};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("binlevel_server=info,binlevel_core=info")),
        )
        .init();

    let config = BinlevelConfig::load()?;
    info!(
        bind_address = %config.server.bind_address,
        backend = config.store.backend_name(),
        "Configuration loaded"
    );

    // One client for the whole process, shared by the store and token refreshes
    let client = Client::builder().user_agent("binlevel/0.1").build()?;
    let store = store::connect(&config.store, client).await?;
    let app = router(IngestionService::new(store), &config.server);

    let listener = TcpListener::bind(config.server.bind_address).await?;
    info!(address = %listener.local_addr()?, "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
