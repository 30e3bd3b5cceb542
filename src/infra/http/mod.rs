pub mod api;
mod middleware;

pub use api::{ApiState, build_api_router};
pub use middleware::RequestContext;

use axum::{
    Json, Router,
    extract::State,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;

use middleware::{log_responses, set_request_context};

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    cache_entries: usize,
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    Json(HealthBody {
        status: "ok",
        cache_entries: state.cache_store.len(),
    })
}

/// Full application router: unauthenticated health probe plus the v1 API.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(state.clone())
        .merge(build_api_router(state))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
