//! HTTP routes for the authorization gate.
//!
//! Defines the Axum router and application state.

use crate::auth::{AuthorizationGate, KeyCache};
use crate::config::Config;
use crate::handlers;
use crate::middleware::http_metrics_middleware;
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Authorization entry point.
    pub gate: Arc<AuthorizationGate>,

    /// Signing key cache shared with the gate and the refresher.
    pub key_cache: Arc<KeyCache>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/` - Service banner
/// - `/health` - Liveness probe (simple "OK")
/// - `/ready` - Readiness probe (signing keys loaded)
/// - `/metrics` - Prometheus metrics endpoint
/// - `/api/v1/authorize/:permission` - Authorization decision for the bearer token
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let app_routes = Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route(
            "/api/v1/authorize/:permission",
            get(handlers::authorize_permission),
        )
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    app_routes
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
