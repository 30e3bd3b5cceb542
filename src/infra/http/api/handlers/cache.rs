//! Admin cache handlers

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

use crate::application::error::AppError;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{CachePurgeRequest, CacheRemovedResponse};
use crate::infra::http::api::state::ApiState;

pub async fn cache_stats(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.cache_store.stats())
}

pub async fn clear_cache(State(state): State<ApiState>) -> impl IntoResponse {
    let removed = state.invalidation.invalidate_all_cache();
    Json(CacheRemovedResponse { removed })
}

pub async fn purge_cache(
    State(state): State<ApiState>,
    Json(payload): Json<CachePurgeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state
        .cache_store
        .delete_by_pattern(&payload.pattern)
        .map_err(AppError::from)?;
    Ok(Json(CacheRemovedResponse { removed }))
}

pub async fn sweep_cache(State(state): State<ApiState>) -> impl IntoResponse {
    let removed = state.cache_store.purge_expired();
    Json(CacheRemovedResponse { removed })
}
