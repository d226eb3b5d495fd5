//! REST query boundary over persisted readings.
//!
//! - `GET    /api/readings`       any role, filtered and paginated
//! - `GET    /api/readings/{id}`  any role
//! - `POST   /api/readings`       admin
//! - `PUT    /api/readings/{id}`  admin
//! - `DELETE /api/readings`       admin, at least one filter field

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::debug;

use super::AppState;
use crate::auth::{AuthUser, Role};
use crate::error::ApiError;
use crate::filter::ReadingsQuery;
use crate::models::{NewSensorReading, PaginatedReadings, SensorReading};

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Serialize)]
struct DeleteResponse {
    message: &'static str,
    count: u64,
}

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/readings", get(list).post(create).delete(delete))
        .route("/api/readings/{id}", get(get_one).put(update))
}

async fn list(
    user: AuthUser,
    State(state): State<AppState>,
    query: Result<Query<ReadingsQuery>, QueryRejection>,
) -> Result<Json<PaginatedReadings>, ApiError> {
    // ---
    user.require(Role::User)?;
    let Query(query) = query?;
    debug!("GET /api/readings {:?}", query);

    let filter = query.filter()?;
    let page = state
        .engine
        .get_by_filter(&filter, query.page_request())
        .await?;
    Ok(Json(page))
}

async fn get_one(
    user: AuthUser,
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<SensorReading>, ApiError> {
    // ---
    user.require(Role::User)?;
    let Path(id) = id?;

    state
        .engine
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("reading not found".to_string()))
}

async fn create(
    user: AuthUser,
    State(state): State<AppState>,
    body: Result<Json<NewSensorReading>, JsonRejection>,
) -> Result<(StatusCode, Json<SensorReading>), ApiError> {
    // ---
    user.require(Role::Admin)?;
    let Json(reading) = body?;

    let persisted = state.engine.create(&reading).await?;
    Ok((StatusCode::CREATED, Json(persisted)))
}

async fn update(
    user: AuthUser,
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<NewSensorReading>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    // ---
    user.require(Role::Admin)?;
    let Path(id) = id?;
    let Json(reading) = body?;

    state.engine.update(id, &reading).await?;
    Ok(Json(MessageResponse {
        message: "reading updated successfully",
    }))
}

async fn delete(
    user: AuthUser,
    State(state): State<AppState>,
    query: Result<Query<ReadingsQuery>, QueryRejection>,
) -> Result<Json<DeleteResponse>, ApiError> {
    // ---
    user.require(Role::Admin)?;
    let Query(query) = query?;

    let filter = query.filter()?;
    let count = state.engine.delete_by_filter(&filter).await?;
    Ok(Json(DeleteResponse {
        message: "readings deleted successfully",
        count,
    }))
}
