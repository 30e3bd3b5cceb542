use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request, header::AUTHORIZATION};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::application::auth::Principal;

use super::error::ApiError;
use super::state::ApiState;

/// Resolve the bearer token to a principal, or answer 401.
pub async fn api_auth(
    State(state): State<ApiState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_token(request.headers().get(AUTHORIZATION)) else {
        return ApiError::unauthorized().into_response();
    };

    let principal = match state.auth.authenticate(&token) {
        Ok(principal) => principal,
        Err(err) => return ApiError::from(err).into_response(),
    };

    request.extensions_mut().insert(principal.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(principal);
    response
}

/// Gate for admin-only routes; runs after `api_auth`.
pub async fn require_admin(request: Request<Body>, next: Next) -> Response {
    let allowed = match request.extensions().get::<Principal>() {
        Some(principal) => principal.requires_admin().map_err(ApiError::from),
        None => Err(ApiError::unauthorized()),
    };

    match allowed {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

fn extract_token(header: Option<&HeaderValue>) -> Option<String> {
    let raw = header?.to_str().ok()?;
    let bearer = raw.strip_prefix("Bearer ")?.trim();
    (!bearer.is_empty()).then(|| bearer.to_string())
}
