//! Test gate and server harness
//!
//! Wires a gate, router or full HTTP server against a JWKS URL, using the
//! test issuer and audience.

use crate::token_builders::{TEST_AUDIENCE, TEST_ISSUER};
use auth_gate::auth::{AuthorizationGate, ClaimValidator, JwksKeySource, KeyCache};
use auth_gate::config::Config;
use auth_gate::observability::metrics::init_metrics_recorder;
use auth_gate::routes::{build_routes, AppState};
use axum::Router;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;

/// JWKS fetch timeout used by test gates.
pub const TEST_FETCH_TIMEOUT: Duration = Duration::from_secs(2);

static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Shared metrics handle for test routers.
///
/// The first caller installs the global recorder; if another test binary
/// already did, an unregistered recorder's handle is used instead.
pub fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Configuration pointing at `jwks_url` with the test issuer and audience.
pub fn test_config(jwks_url: &str) -> Config {
    let vars = HashMap::from([
        ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ("AUTH_ISSUER".to_string(), TEST_ISSUER.to_string()),
        ("AUTH_AUDIENCE".to_string(), TEST_AUDIENCE.to_string()),
        ("AUTH_JWKS_URL".to_string(), jwks_url.to_string()),
        (
            "JWKS_FETCH_TIMEOUT_SECONDS".to_string(),
            TEST_FETCH_TIMEOUT.as_secs().to_string(),
        ),
    ]);
    Config::from_vars(&vars).expect("test config should be valid")
}

/// Gate backed by an HTTP key source at `jwks_url`.
///
/// Returns the key cache too, so tests can inspect or refresh it.
pub fn test_gate(jwks_url: &str) -> (AuthorizationGate, Arc<KeyCache>) {
    gate_from_config(&test_config(jwks_url))
}

/// Router wired exactly as the service wires it.
pub fn test_router(jwks_url: &str) -> Router {
    let config = test_config(jwks_url);
    let (gate, key_cache) = gate_from_config(&config);
    let state = Arc::new(AppState {
        config,
        gate: Arc::new(gate),
        key_cache,
    });
    build_routes(state, test_metrics_handle())
}

fn gate_from_config(config: &Config) -> (AuthorizationGate, Arc<KeyCache>) {
    let source = Arc::new(JwksKeySource::new(
        config.jwks_url.clone(),
        config.jwks_fetch_timeout(),
    ));
    let key_cache = Arc::new(KeyCache::with_settings(
        source,
        config.jwks_cache_ttl(),
        config.jwks_fetch_timeout(),
    ));
    let validator = ClaimValidator::new(
        config.issuer.clone(),
        config.audience.clone(),
        config.jwt_clock_skew(),
    );
    (
        AuthorizationGate::new(Arc::clone(&key_cache), validator),
        key_cache,
    )
}

/// Test harness for running the gate as a real HTTP server
///
/// # Example
/// ```rust,ignore
/// let jwks = MockJwksServer::start(&[&key]).await;
/// let server = TestGateServer::spawn(&jwks.jwks_url()).await?;
///
/// let response = reqwest::Client::new()
///     .get(format!("{}/api/v1/authorize/post:drinks", server.url()))
///     .header("Authorization", bearer(&token))
///     .send()
///     .await?;
/// ```
pub struct TestGateServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl TestGateServer {
    /// Bind to a random local port and serve the router in the background.
    pub async fn spawn(jwks_url: &str) -> Result<Self, anyhow::Error> {
        let app = test_router(jwks_url);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;
        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self { addr, handle })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestGateServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
