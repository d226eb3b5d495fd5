// src/routes/health.rs
//! Liveness endpoint shared by both services.
//!
//! Sibling module of the `routes` gateway (EMBP): exports a subrouter with
//! `GET /health`, generic over state so either service can merge it.

use axum::{routing::get, Json, Router};
use serde::Serialize;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Handle `GET /health`. Touches no storage and no stream.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

/// Subrouter containing the `/health` route.
///
/// # Type Parameters
/// - `S`: Application state type shared by all routes in the gateway.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health))
}
