// Route handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::resolver::{
    NormalizedVideoResult, PlaylistResult, PoolStatus, SearchResultItem, VideoSummary,
};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IdParams {
    pub id: Option<String>,
}

fn required(value: Option<String>, name: &str) -> ApiResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("query parameter '{}' is required", name)))
}

/// Liveness
pub async fn root() -> StatusCode {
    StatusCode::OK
}

/// Current pool contents
pub async fn pool_data(State(state): State<AppState>) -> ApiResult<Json<PoolStatus>> {
    let status = state.pool.status().await;
    if status.providers.is_empty() {
        return Err(ApiError::PoolUnavailable(status.last_error));
    }
    Ok(Json(status))
}

/// Re-read the provider directory
pub async fn refresh_pool(State(state): State<AppState>) -> ApiResult<Json<PoolStatus>> {
    let count = state.pool.refresh().await;
    let status = state.pool.status().await;
    if count == 0 {
        return Err(ApiError::PoolUnavailable(status.last_error));
    }
    Ok(Json(status))
}

/// `/api/{id}` and `/api/login/{id}`
pub async fn resolve_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<NormalizedVideoResult>> {
    let deadline = state.pipeline.config().deadline;
    let resolved = state.pipeline.resolve_by_id(&id, deadline).await?;
    tracing::info!(
        video_id = %id,
        provider = %resolved.provider,
        attempts = resolved.attempts.len(),
        "video resolved"
    );
    Ok(Json(resolved.value))
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<SearchResultItem>>> {
    let query = required(params.q, "q")?;
    let deadline = state.pipeline.config().deadline;
    let resolved = state.pipeline.search(&query, deadline).await?;
    Ok(Json(resolved.value))
}

pub async fn video_info(
    State(state): State<AppState>,
    Query(params): Query<IdParams>,
) -> ApiResult<Json<VideoSummary>> {
    let id = required(params.id, "id")?;
    let deadline = state.pipeline.config().deadline;
    let resolved = state.pipeline.video_summary(&id, deadline).await?;
    Ok(Json(resolved.value))
}

pub async fn playlist_info(
    State(state): State<AppState>,
    Query(params): Query<IdParams>,
) -> ApiResult<Json<PlaylistResult>> {
    let id = required(params.id, "id")?;
    let deadline = state.pipeline.config().deadline;
    let resolved = state.pipeline.playlist(&id, deadline).await?;
    Ok(Json(resolved.value))
}
