//! JWKS refresher background task.
//!
//! Refreshes the signing key cache on a fixed interval so that request
//! paths rarely pay for a fetch. Lookups still refetch on their own when a
//! snapshot ages out or a `kid` is unknown.
//!
//! # Graceful Shutdown
//!
//! The task supports graceful shutdown via a cancellation token. When the token
//! is cancelled, the task completes its current iteration and exits cleanly.

use crate::auth::KeyCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Start the JWKS refresher background task.
///
/// The first tick fires immediately, which warms the cache at startup.
///
/// # Arguments
///
/// * `key_cache` - Cache to refresh
/// * `interval` - Time between refreshes
/// * `cancel_token` - Token for graceful shutdown
///
/// # Returns
///
/// Returns when the cancellation token is triggered.
#[instrument(skip_all, name = "gate.task.jwks_refresher")]
pub async fn start_jwks_refresher(
    key_cache: Arc<KeyCache>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "gate.task.jwks_refresher",
        interval_seconds = interval.as_secs(),
        "Starting JWKS refresher task"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match key_cache.refresh().await {
                    Ok(count) => {
                        tracing::debug!(
                            target: "gate.task.jwks_refresher",
                            key_count = count,
                            "Signing keys refreshed"
                        );
                    }
                    Err(e) => {
                        // Previous keys stay until they age out
                        warn!(
                            target: "gate.task.jwks_refresher",
                            error = %e,
                            "Failed to refresh signing keys"
                        );
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                info!(
                    target: "gate.task.jwks_refresher",
                    "JWKS refresher task received shutdown signal, exiting"
                );
                break;
            }
        }
    }
}
