//! `GET /ingest/stream`: WebSocket upgrade into an ingestion session.
//!
//! Unauthenticated; the endpoint is meant for the internal network only.

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tracing::{info, warn};

use super::AppState;
use crate::ingest::IngestionSink;
use crate::stream::WsIngestSession;

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/ingest/stream", get(upgrade))
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve(state.sink, socket))
}

async fn serve(sink: IngestionSink, socket: WebSocket) {
    // ---
    match sink.serve(WsIngestSession::new(socket)).await {
        Ok(ack) => info!("Acknowledged {} readings", ack.accepted_count),
        Err(e) => warn!("Ingest session ended without acknowledgment: {}", e),
    }
}
