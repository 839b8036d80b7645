//! # Gate Test Utilities
//!
//! Shared test utilities for the authorization gate.
//!
//! This crate provides:
//! - Deterministic signing keys (Ed25519 from seeds, a fixed RSA key)
//! - Claim builders (`TestClaimsBuilder`)
//! - A wiremock-backed JWKS endpoint (`MockJwksServer`)
//! - An in-memory key source that counts fetches (`CountingKeySource`)
//! - Gate and router constructors wired to the above
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gate_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let key = TestSigningKey::ed25519(1, "key1");
//!     let jwks = MockJwksServer::start(&[&key]).await;
//!     let (gate, _cache) = test_gate(&jwks.jwks_url());
//!
//!     let token = key.sign(&TestClaimsBuilder::new().with_permissions(&["post:drinks"]).build());
//!     let claims = gate.authorize(Some(&bearer(&token)), "post:drinks").await?;
//! }
//! ```

pub mod crypto_fixtures;
pub mod harness;
pub mod jwks_server;
pub mod key_sources;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use harness::*;
pub use jwks_server::*;
pub use key_sources::*;
pub use token_builders::*;
