use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use marketplace_worker::config::{MarketplaceConfig, WorkerConfig};
use marketplace_worker::handlers::HandlerRegistry;
use marketplace_worker::handlers::builtin::register_builtin;
use marketplace_worker::marketplace::HttpMarketplace;
use marketplace_worker::worker::Worker;

/// Console logging, plus a daily-rolling file under `WORKER_LOG_DIR` when set.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match std::env::var("WORKER_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "marketplace-worker.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    guard
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_tracing();

    let marketplace_config =
        MarketplaceConfig::from_env().context("BLACKROAD_API_KEY must be set to reach the marketplace")?;
    let worker_config = WorkerConfig::from_env().context("invalid worker configuration")?;

    eprintln!("Marketplace Worker v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: {}", marketplace_config.api_url);
    eprintln!("   Concurrency: {}", worker_config.concurrency);
    eprintln!("   Skills: {}", worker_config.skills.join(", "));
    eprintln!("   Poll interval: {:?}\n", worker_config.poll_interval);

    let marketplace = Arc::new(HttpMarketplace::new(marketplace_config)?);

    let registry = Arc::new(HandlerRegistry::new());
    register_builtin(&registry).await;

    let worker = Worker::new(worker_config, marketplace, registry)?;
    worker.start().await?;

    tracing::info!("Worker is running. Press Ctrl+C to stop.");
    shutdown_signal().await;

    tracing::info!("Shutting down...");
    worker.stop().await;

    Ok(())
}
