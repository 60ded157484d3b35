// =============================================================================
// Binance Market Data Ingestion Pipeline — Entry Point
// =============================================================================
//
// Startup sequencing, the termination signal wait, and the reverse-order
// resource release all live in the supervisor (C8); this file only wires
// config, logging, and the root cancellation token together.
// =============================================================================

mod backfill;
mod binance;
mod config;
mod error;
mod persistence;
mod publisher;
mod stream_service;
mod supervisor;
mod wire;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::supervisor::Supervisor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    let config = match AppConfig::load(Some("config")) {
        Ok(c) => c,
        Err(e) => {
            // Logging is not configured yet, this is a last resort.
            eprintln!("fatal: failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.app.log_level)),
        )
        .init();

    info!(app = %config.app.name, env = %config.app.environment, "starting up");

    let cancel = CancellationToken::new();
    let supervisor = Supervisor::new(config);

    let supervisor_cancel = cancel.clone();
    let supervisor_handle = tokio::spawn(async move { supervisor.run(supervisor_cancel).await });

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "failed to install ctrl-c handler");
            }
            warn!("shutdown signal received, cancelling root context");
            cancel.cancel();
        }
    }

    match supervisor_handle.await {
        Ok(Ok(())) => {
            info!("shut down cleanly");
            Ok(())
        }
        Ok(Err(e)) => {
            error!(error = %e, "fatal startup or runtime error");
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "supervisor task panicked");
            std::process::exit(1);
        }
    }
}
