//! Bearer token authorization gate.
//!
//! Verifies JWT access tokens issued by a trusted authority against its
//! published JWKS and enforces that the caller holds a required permission
//! before a protected operation runs.
//!
//! # Architecture
//!
//! ```text
//! AuthorizationGate -> decoder -> SignatureVerifier (KeyCache -> KeySource)
//!                   -> ClaimValidator -> require_permission
//! ```
//!
//! # Modules
//!
//! - `auth` - The token pipeline and signing key cache
//! - `config` - Service configuration from environment
//! - `errors` - Authorization error taxonomy with HTTP mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP metrics middleware
//! - `observability` - Metrics definitions
//! - `routes` - Axum router setup
//! - `tasks` - Background JWKS refresher

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod tasks;

pub use auth::{AuthDecision, AuthorizationGate, ClaimValidator, KeyCache, KeySource, TokenClaims};
pub use errors::AuthError;
