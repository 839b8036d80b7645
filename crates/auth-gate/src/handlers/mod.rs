//! HTTP request handlers for the authorization gate.

pub mod authorize;
pub mod health;
pub mod index;
pub mod metrics;

pub use authorize::authorize_permission;
pub use health::{health_check, readiness_check};
pub use index::index;
pub use metrics::metrics_handler;
