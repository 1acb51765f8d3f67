//! # councild: council daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Load configuration (`council.toml`, env vars) and initialise logging
//! - Register the storage connectors and the named handler catalog
//! - Restore automation definitions and publish the active ones
//! - Build the axum router and serve until SIGINT/SIGTERM
//! - Close backend connections on shutdown
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use council_adapter_definitions_fs::{FsArtifactWriter, FsDefinitionStore};
use council_adapter_http_axum::router;
use council_adapter_http_axum::state::AppState;
use council_adapter_storage_sqlite_sqlx::SqliteConnector;
use council_app::builtin::EchoHandler;
use council_app::dispatcher::Dispatcher;
use council_app::memory::MemoryConnector;
use council_app::registry::AutomationRegistry;
use council_app::resolver::HandlerResolver;
use council_app::services::AutomationManager;
use council_app::storage::StorageFactory;
use council_domain::automation::backend;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    let filter = EnvFilter::try_new(&config.logging.filter)
        .with_context(|| format!("invalid log filter {:?}", config.logging.filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Storage
    let storage = Arc::new(
        StorageFactory::new()
            .with_connector(backend::MEMORY, MemoryConnector)
            .with_connector(backend::RELATIONAL, SqliteConnector),
    );

    // Handlers
    let resolver = HandlerResolver::new().with_handler("builtin.echo", EchoHandler);

    // Services
    let dispatcher = Arc::new(Dispatcher::new(resolver, Arc::clone(&storage)));
    let registry = AutomationRegistry::new(FsDefinitionStore::new(&config.definitions.dir));
    let manager = AutomationManager::new(
        registry,
        dispatcher,
        FsArtifactWriter::new(&config.artifacts.dir),
    );
    let live = manager
        .initialize()
        .await
        .context("failed to restore automation definitions")?;
    tracing::info!(
        live,
        dir = %config.definitions.dir.display(),
        "automation definitions restored"
    );

    // HTTP
    let app = router::build(AppState::new(manager));
    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!("councild listening on http://{bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    storage.close().await;
    tracing::info!("councild stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
