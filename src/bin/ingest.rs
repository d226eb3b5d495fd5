//! Entry point for `sensorflow-ingest`.
//!
//! Startup sequence:
//! - Load configuration from environment variables or `.env`
//! - Initialize structured logging/tracing
//! - Open the configured storage backend (PostgreSQL with schema setup, or
//!   in-memory)
//! - Mount the stream endpoint, query API, login and health routes via the
//!   `routes` gateway (EMBP)
//! - Serve until Ctrl-C / SIGTERM, then drain in-flight requests
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;

use sensorflow::{
    create_schema, ingest_router, init_tracing, load_ingest_from_env, shutdown_signal, AppState,
    Authenticator, IngestionSink, MemoryStorage, PgStorage, QueryEngine, Storage, StorageBackend,
};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = load_ingest_from_env()?;
    cfg.log_config();

    let storage: Arc<dyn Storage> = match &cfg.storage {
        StorageBackend::Postgres {
            db_url,
            db_pool_max,
            connect_attempts,
        } => {
            let pg = PgStorage::connect(db_url, *db_pool_max, *connect_attempts)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Successfully connected to database");

            create_schema(pg.pool()).await?;
            Arc::new(pg)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; readings are lost on exit");
            Arc::new(MemoryStorage::new())
        }
    };

    let state = AppState {
        engine: QueryEngine::new(storage.clone()),
        sink: IngestionSink::new(storage),
        auth: Arc::new(Authenticator::new(
            &cfg.jwt_secret,
            cfg.jwt_ttl_hours,
            cfg.accounts.clone(),
        )),
    };
    let app = ingest_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(CancellationToken::new()))
        .await?;

    tracing::info!("Ingest service stopped");
    Ok(())
}
