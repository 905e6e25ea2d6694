use anyhow::Context;
use clap::{Parser, Subcommand};
use inventory_api::config::Settings;
use inventory_api::inventory::InventoryStores;
use inventory_api::store::MemoryBackend;
use inventory_api::{api, logging, store};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "inventory-api", version, about = "Inventory CRUD API over a partitioned document store")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Listen address, overriding server.bind
    #[arg(long, global = true)]
    bind: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the inventory API against the configured backend
    ServeApi,
    /// Serve a store node over an in-memory backend
    ServeStore,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(bind) = cli.bind {
        settings.server.bind = bind;
    }
    logging::init(&settings.logging);

    // 1. Router for the requested role:
    let app = match cli.command {
        Command::ServeApi => {
            let backend = settings.store.open_backend()?;
            tracing::info!(
                "Using {:?} backend, database '{}'",
                settings.store.backend,
                settings.store.database
            );
            let stores = InventoryStores::from_settings(backend, &settings.store);
            api::router(stores, settings.server.request_timeout())
        }
        Command::ServeStore => store::handlers::router(Arc::new(MemoryBackend::new())),
    };

    // 2. Start HTTP server:
    let listener = tokio::net::TcpListener::bind(&settings.server.bind)
        .await
        .with_context(|| format!("binding {}", settings.server.bind))?;

    tracing::info!("HTTP server listening on {}", listener.local_addr()?);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
