//! Token decoding.
//!
//! Turns a raw compact JWT into its header, unverified claims and the
//! borrowed segments needed for signature verification. Nothing produced
//! here is trusted.

use crate::auth::claims::{RawClaims, UnverifiedClaims};
use crate::errors::AuthError;
use common::jwt::{self, JwtValidationError};
use jsonwebtoken::Algorithm;
use std::str::FromStr;

/// Decoded protected header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// Declared signing algorithm.
    pub alg: Algorithm,

    /// Key ID used to select the verification key.
    pub kid: String,

    /// Optional media type.
    pub typ: Option<String>,
}

/// A structurally valid token awaiting signature verification.
#[derive(Debug)]
pub struct DecodedToken<'a> {
    pub header: TokenHeader,
    pub claims: UnverifiedClaims,

    /// Base64url signature segment as transmitted.
    pub signature: &'a str,

    /// `header.claims` exactly as transmitted.
    pub signing_input: &'a str,
}

fn malformed(error: JwtValidationError) -> AuthError {
    tracing::debug!(target: "gate.auth.decoder", error = ?error, "Token rejected during decoding");
    AuthError::MalformedToken
}

/// Decode a raw bearer token.
///
/// # Errors
///
/// Returns `AuthError::MalformedToken` if the token is oversized, does not
/// have exactly three non-empty base64url segments, carries a header without
/// `alg`/`kid`, names an unknown algorithm (including `none`), or has a
/// claims segment that is not a JSON object of correctly typed claims.
///
/// The signature segment is left opaque. Any defect in it, including text
/// that is not base64url, surfaces as `InvalidSignature` during verification.
pub fn decode(raw: &str) -> Result<DecodedToken<'_>, AuthError> {
    let segments = jwt::split_token(raw).map_err(malformed)?;
    let header = jwt::decode_header(segments.header).map_err(malformed)?;

    let alg = Algorithm::from_str(&header.alg).map_err(|_| {
        tracing::debug!(
            target: "gate.auth.decoder",
            alg = %header.alg,
            "Token rejected: unsupported algorithm"
        );
        AuthError::MalformedToken
    })?;

    let claims: serde_json::Value = jwt::decode_json_segment(segments.claims).map_err(malformed)?;
    if !claims.is_object() {
        tracing::debug!(target: "gate.auth.decoder", "Token rejected: claims are not a JSON object");
        return Err(AuthError::MalformedToken);
    }
    let claims: RawClaims = serde_json::from_value(claims).map_err(|e| {
        tracing::debug!(target: "gate.auth.decoder", error = %e, "Token rejected: claim has wrong type");
        AuthError::MalformedToken
    })?;

    Ok(DecodedToken {
        header: TokenHeader {
            alg,
            kid: header.kid,
            typ: header.typ,
        },
        claims: UnverifiedClaims::new(claims),
        signature: segments.signature,
        signing_input: segments.signing_input,
    })
}
