//! Bearer token authorization.
//!
//! # Components
//!
//! - `decoder` - Splits a raw token into header, unverified claims and signature
//! - `jwks` - Key source trait, HTTP JWKS source and the signing key cache
//! - `verifier` - Signature verification against cached keys
//! - `validator` - Issuer, audience and time-based claim checks
//! - `permissions` - Required permission enforcement
//! - `claims` - Claim types for each trust stage
//! - `gate` - The single authorization entry point

pub mod claims;
pub mod decoder;
pub mod gate;
pub mod jwks;
pub mod permissions;
pub mod validator;
pub mod verifier;

pub use claims::{Audience, TokenClaims, UnverifiedClaims, VerifiedClaims};
pub use decoder::{decode, DecodedToken, TokenHeader};
pub use gate::{extract_bearer_token, AuthDecision, AuthorizationGate};
pub use jwks::{JwksKeySource, Jwk, JwkError, JwksResponse, KeyCache, KeySource, SigningKey};
pub use permissions::require_permission;
pub use validator::ClaimValidator;
pub use verifier::SignatureVerifier;
