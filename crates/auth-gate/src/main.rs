//! Authorization gate service.
//!
//! Serves authorization decisions for the drinks API over HTTP.

use auth_gate::auth::{AuthorizationGate, ClaimValidator, JwksKeySource, KeyCache};
use auth_gate::config::Config;
use auth_gate::observability::metrics::init_metrics_recorder;
use auth_gate::routes::{self, AppState};
use auth_gate::tasks::start_jwks_refresher;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_DRAIN_SECONDS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting authorization gate");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        issuer = %config.issuer,
        audience = %config.audience,
        jwks_url = %config.jwks_url,
        jwks_cache_ttl_seconds = config.jwks_cache_ttl_seconds,
        jwks_refresh_interval_seconds = config.jwks_refresh_interval_seconds,
        jwt_clock_skew_seconds = config.jwt_clock_skew_seconds,
        "Configuration loaded"
    );

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let key_cache = Arc::new(KeyCache::with_settings(
        Arc::new(JwksKeySource::new(
            config.jwks_url.clone(),
            config.jwks_fetch_timeout(),
        )),
        config.jwks_cache_ttl(),
        config.jwks_fetch_timeout(),
    ));
    let gate = Arc::new(AuthorizationGate::new(
        Arc::clone(&key_cache),
        ClaimValidator::new(
            config.issuer.clone(),
            config.audience.clone(),
            config.jwt_clock_skew(),
        ),
    ));

    // Cancelled once the drain period ends; stops the server and the refresher.
    let shutdown = CancellationToken::new();

    let refresher = match config.jwks_refresh_interval() {
        Some(interval) => Some(tokio::spawn(start_jwks_refresher(
            Arc::clone(&key_cache),
            interval,
            shutdown.child_token(),
        ))),
        None => {
            info!("JWKS refresher disabled, keys load on first use");
            None
        }
    };

    let app = routes::build_routes(
        Arc::new(AppState {
            config,
            gate,
            key_cache,
        }),
        metrics_handle,
    );

    tokio::spawn(cancel_on_signal(shutdown.clone(), drain_period()));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Authorization gate listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await?;

    shutdown.cancel();
    if let Some(handle) = refresher {
        if let Err(e) = handle.await {
            warn!("JWKS refresher task ended abnormally: {}", e);
        }
    }

    info!("Authorization gate shutdown complete");
    Ok(())
}

/// Plain text logs by default, JSON lines with `LOG_FORMAT=json`.
fn init_tracing() {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auth_gate=debug,common=info,tower_http=debug".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

fn drain_period() -> Duration {
    let seconds = std::env::var("GATE_DRAIN_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_DRAIN_SECONDS);
    Duration::from_secs(seconds)
}

/// Waits for SIGINT or SIGTERM, lets in-flight requests drain, then cancels.
async fn cancel_on_signal(shutdown: CancellationToken, drain: Duration) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, starting graceful shutdown"),
        () = terminate => info!("Received SIGTERM, starting graceful shutdown"),
    }

    if drain.is_zero() {
        info!("Skipping drain period (GATE_DRAIN_SECONDS=0)");
    } else {
        warn!(drain_seconds = drain.as_secs(), "Draining connections");
        tokio::time::sleep(drain).await;
    }

    shutdown.cancel();
}
