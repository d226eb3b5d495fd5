//! Entry point for `sensorflow-generator`.
//!
//! Runs the supervised generator against the ingest stream endpoint and
//! serves the frequency configuration API next to it. On Ctrl-C / SIGTERM
//! the generator finishes its stream gracefully (end of input, then wait
//! for the acknowledgment) before the process exits.
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;

use sensorflow::{
    generator_router, init_tracing, load_generator_from_env, shutdown_signal, supervise,
    FrequencyControl, Generator, SyntheticReadings, WsConnector,
};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = load_generator_from_env()?;
    cfg.log_config();

    let frequency = FrequencyControl::new(cfg.frequency_ms);
    let cancel = CancellationToken::new();

    let generator = Generator::new(
        WsConnector::new(cfg.ingest_url.clone()),
        frequency.clone(),
        SyntheticReadings::new(cfg.sensor_type.clone()),
    );
    let supervisor = tokio::spawn(supervise(
        generator,
        cancel.clone(),
        Duration::from_secs(cfg.reconnect_backoff_secs),
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.config_port));
    tracing::info!("Configuration API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, generator_router(frequency))
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    // The server can also stop on its own; make sure the generator follows
    cancel.cancel();
    supervisor.await.context("Generator task panicked")?;

    tracing::info!("Generator service stopped");
    Ok(())
}
