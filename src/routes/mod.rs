//! HTTP route gateway for both services.
//!
//! Each sibling module exports a subrouter; this gateway merges them and
//! attaches state so the binaries never see individual endpoints (EMBP).
//! - [`ingest_router`]: stream endpoint, query API, login, health
//! - [`generator_router`]: frequency configuration, health

use std::sync::Arc;

use axum::extract::FromRef;
use axum::Router;

use crate::auth::Authenticator;
use crate::frequency::FrequencyControl;
use crate::ingest::IngestionSink;
use crate::query::QueryEngine;

mod auth;
mod config;
mod health;
mod readings;
mod stream;

// ---

/// Shared state behind the ingest service routes.
#[derive(Clone)]
pub struct AppState {
    pub engine: QueryEngine,
    pub sink: IngestionSink,
    pub auth: Arc<Authenticator>,
}

impl FromRef<AppState> for Arc<Authenticator> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

pub fn ingest_router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(stream::router())
        .merge(readings::router())
        .merge(auth::router())
        .merge(health::router())
        .with_state(state)
}

pub fn generator_router(frequency: FrequencyControl) -> Router {
    // ---
    Router::new()
        .merge(config::router())
        .merge(health::router())
        .with_state(frequency)
}
