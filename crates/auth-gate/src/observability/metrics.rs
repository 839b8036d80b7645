//! Metrics definitions for the authorization gate.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gate_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: normalized, permission path segments collapse to `{permission}`
//! - `outcome`: `allowed` or one `AuthError` code
//! - `status`: success, error, timeout
//! - `result`: hit, refetch_hit, not_found, unavailable
//! - `error`: bearer challenge error attribute, 4 values

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("gate_http_request".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Cache hits are sub-millisecond; refetches pay a JWKS round trip
        .set_buckets_for_metric(
            Matcher::Prefix("gate_authorization".to_string()),
            &[
                0.0001, 0.0005, 0.001, 0.002, 0.005, 0.010, 0.050, 0.100, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set authorization buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("gate_jwks_fetch".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set JWKS fetch buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `gate_http_requests_total`, `gate_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("gate_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("gate_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Record a 401/403 response
///
/// Metric: `gate_http_denials_total`
/// Labels: `error` (`invalid_request`, `invalid_token`, `insufficient_scope`, `none`)
pub fn record_http_denial(error: &'static str) {
    counter!("gate_http_denials_total",
        "error" => error
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/" | "/health" | "/ready" | "/metrics" => path.to_string(),
        _ => {
            // /api/v1/authorize/{permission}
            match path.strip_prefix("/api/v1/authorize/") {
                Some(rest) if !rest.is_empty() && !rest.contains('/') => {
                    "/api/v1/authorize/{permission}".to_string()
                }
                _ => "/other".to_string(),
            }
        }
    }
}

// ============================================================================
// Authorization Metrics
// ============================================================================

/// Record one authorization decision
///
/// Metric: `gate_authorizations_total`, `gate_authorization_duration_seconds`
/// Labels: `outcome` (`allowed` or the error code)
pub fn record_authorization(outcome: &'static str, duration: Duration) {
    histogram!("gate_authorization_duration_seconds",
        "outcome" => outcome
    )
    .record(duration.as_secs_f64());

    counter!("gate_authorizations_total",
        "outcome" => outcome
    )
    .increment(1);
}

// ============================================================================
// Key Source Metrics
// ============================================================================

/// Record a key set fetch
///
/// Metric: `gate_jwks_fetches_total`, `gate_jwks_fetch_duration_seconds`
/// Labels: `status` (success, error, timeout)
pub fn record_jwks_fetch(status: &'static str, duration: Duration) {
    histogram!("gate_jwks_fetch_duration_seconds",
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("gate_jwks_fetches_total",
        "status" => status
    )
    .increment(1);
}

/// Record a signing key lookup
///
/// Metric: `gate_key_lookups_total`
/// Labels: `result`
pub fn record_key_lookup(result: &'static str) {
    counter!("gate_key_lookups_total",
        "result" => result
    )
    .increment(1);
}
