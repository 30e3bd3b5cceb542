use axum::Json;
use axum::extract::{Extension, Query, State};
use axum::response::IntoResponse;

use crate::application::auth::Principal;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::AsOfQuery;
use crate::infra::http::api::state::ApiState;

use super::as_of;

pub async fn dashboard(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<AsOfQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .dashboard
        .summary(&principal.user_id, as_of(&query))
        .await?;
    Ok(Json(summary))
}
