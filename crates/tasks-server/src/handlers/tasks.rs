//! Task handlers

use super::ApiError;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tasks_types::{NewTaskRequest, Task};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    offset: Option<i64>,
    limit: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let offset = params.offset.unwrap_or(0);
    let limit = params.limit.unwrap_or(state.default_page_size);
    Ok(Json(state.tasks.list(offset, limit).await?))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Task>, ApiError> {
    state
        .tasks
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Task with id={} does not exist!", id)))
}

pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<NewTaskRequest>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(state.tasks.create(req).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<NewTaskRequest>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(state.tasks.update(id, req).await?))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.tasks.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
