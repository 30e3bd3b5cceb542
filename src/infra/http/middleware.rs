use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderValue, Request, Uri},
    middleware::Next,
    response::Response,
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::{auth::Principal, error::ErrorReport};

const REQUEST_ID_HEADER: &str = "x-request-id";
const RESPONSE_TARGET: &str = "fleetdesk::http::response";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Tags the request with an id, reusing a well-formed inbound `x-request-id`.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty() && value.len() <= 64)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let ctx = RequestContext { request_id };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

/// Logs every 4xx/5xx response with the caller and the error chain.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();
    let started = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    if status.is_success() || status.is_redirection() || status.is_informational() {
        return response;
    }

    let failure = FailedResponse {
        status: status.as_u16(),
        method,
        uri,
        request_id,
        elapsed_ms: started.elapsed().as_millis(),
        principal: response.extensions().get::<Principal>().cloned(),
        report: response.extensions_mut().remove::<ErrorReport>(),
    };
    failure.emit(status.is_server_error());

    response
}

struct FailedResponse {
    status: u16,
    method: String,
    uri: Uri,
    request_id: String,
    elapsed_ms: u128,
    principal: Option<Principal>,
    report: Option<ErrorReport>,
}

impl FailedResponse {
    fn emit(self, server_side: bool) {
        let (user_id, role) = self
            .principal
            .as_ref()
            .map(|p| (p.user_id.as_str(), p.role.as_str()))
            .unwrap_or(("", ""));
        let (source, chain) = self
            .report
            .map(|report| (report.source, report.messages))
            .unwrap_or(("unknown", Vec::new()));
        let detail = chain.first().map(String::as_str).unwrap_or("no diagnostic available");
        let path = self.uri.path();
        let query = self.uri.query().unwrap_or("");

        if server_side {
            error!(
                target: RESPONSE_TARGET,
                status = self.status,
                method = %self.method,
                path,
                query,
                elapsed_ms = self.elapsed_ms,
                source,
                detail,
                chain = ?chain,
                request_id = %self.request_id,
                user_id,
                role,
                "request failed"
            );
        } else {
            warn!(
                target: RESPONSE_TARGET,
                status = self.status,
                method = %self.method,
                path,
                query,
                elapsed_ms = self.elapsed_ms,
                source,
                detail,
                request_id = %self.request_id,
                user_id,
                role,
                "client request error"
            );
        }
    }
}
