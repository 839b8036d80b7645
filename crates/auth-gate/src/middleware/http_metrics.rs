//! Request metrics for every response the router produces, including 404/405
//! answers that never reach a handler.

use crate::observability::metrics::{record_http_denial, record_http_request};
use axum::{
    extract::Request,
    http::{header::WWW_AUTHENTICATE, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Records request count and latency, plus a denial counter keyed by the
/// bearer challenge's `error` attribute for 401/403 responses.
///
/// Must be the outermost layer.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let response = next.run(request).await;
    let status = response.status().as_u16();

    if matches!(status, 401 | 403) {
        let error = challenge_error(response.headers().get(WWW_AUTHENTICATE));
        tracing::debug!(target: "gate.middleware", path = %path, status, error, "Request denied");
        record_http_denial(error);
    }

    record_http_request(method.as_str(), &path, status, started.elapsed());
    response
}

/// The `error` attribute of a `Bearer` challenge, or `none` when absent.
fn challenge_error(challenge: Option<&HeaderValue>) -> &'static str {
    let Some(value) = challenge.and_then(|v| v.to_str().ok()) else {
        return "none";
    };

    ["invalid_request", "invalid_token", "insufficient_scope"]
        .into_iter()
        .find(|code| value.contains(&format!("error=\"{code}\"")))
        .unwrap_or("none")
}
