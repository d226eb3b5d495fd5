//! Generator configuration boundary: `GET`/`PUT /config/frequency`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::error::ApiError;
use crate::frequency::{FrequencyControl, MIN_FREQUENCY_MS};

#[derive(Debug, Deserialize, Validate)]
struct UpdateFrequencyRequest {
    #[validate(required, range(min = MIN_FREQUENCY_MS, message = "frequency_ms must be at least 100"))]
    frequency_ms: Option<u64>,
}

#[derive(Serialize)]
struct FrequencyResponse {
    frequency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

// ---

pub fn router() -> Router<FrequencyControl> {
    Router::new().route("/config/frequency", get(current).put(update))
}

async fn current(State(frequency): State<FrequencyControl>) -> Json<FrequencyResponse> {
    Json(FrequencyResponse {
        frequency_ms: frequency.get(),
        message: None,
    })
}

async fn update(
    State(frequency): State<FrequencyControl>,
    body: Result<Json<UpdateFrequencyRequest>, JsonRejection>,
) -> Result<Json<FrequencyResponse>, ApiError> {
    // ---
    let Json(req) = body?;
    req.validate()?;
    let frequency_ms = req
        .frequency_ms
        .ok_or_else(|| ApiError::BadRequest("frequency_ms is required".to_string()))?;

    frequency.set(frequency_ms);
    info!("Generator pace set to {} ms", frequency_ms);

    Ok(Json(FrequencyResponse {
        frequency_ms,
        message: Some("frequency updated successfully"),
    }))
}
