//! `POST /api/auth/login`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    #[serde(rename = "type")]
    token_type: &'static str,
}

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/api/auth/login", post(login))
}

async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    // ---
    let Json(req) = body?;
    let token = state.auth.login(&req.username, &req.password)?;
    info!("Issued token for '{}'", req.username);

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer",
    }))
}
