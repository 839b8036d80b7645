//! JWT format primitives shared by the gate and its test utilities.
//!
//! This module knows about the compact JWS serialization only. It never
//! touches keys, and it leaves the signature segment opaque:
//! - Size limits for DoS prevention
//! - Clock skew constants for iat validation
//! - Splitting a token into its three segments and the signing input
//! - Decoding base64url JSON segments and the protected header
//! - `iat` check against a clock skew
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing returned from here is trusted; claims decoded with
//!   [`decode_json_segment`] must be verified before use
//! - Error messages are generic; details go to debug logs
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{decode_header, split_token};
//!
//! let segments = split_token(token)?;
//! let header = decode_header(segments.header)?;
//! // look up header.kid, then verify segments.signing_input
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any base64 decoding,
/// JSON parsing or signature work.
///
/// # Rationale
///
/// - Typical access tokens are 500-1500 bytes (RS256 signatures are 342 chars)
/// - 8KB leaves room for large permission lists while preventing abuse
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (5 minutes per NIST SP 800-63B).
///
/// Tokens with `iat` (issued-at) timestamps more than this amount in the
/// future are rejected.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while taking a JWT apart.
///
/// These stay internal; callers map them onto their own error taxonomy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("token exceeds the maximum size")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("token is not a well-formed JWT")]
    MalformedToken,

    /// Token is missing required `kid` header.
    #[error("token header has no key ID")]
    MissingKid,

    /// Token is missing required `alg` header.
    #[error("token header has no algorithm")]
    MissingAlg,

    /// Token `iat` claim is too far in the future.
    #[error("token issued in the future")]
    IatTooFarInFuture,
}

// =============================================================================
// Token Structure
// =============================================================================

/// The three segments of a compact JWS, borrowed from the raw token.
///
/// `signing_input` is the exact `header.claims` byte range as transmitted;
/// signatures must be checked against it, never against re-serialized JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSegments<'a> {
    /// Base64url protected header.
    pub header: &'a str,

    /// Base64url claims set.
    pub claims: &'a str,

    /// Base64url signature.
    pub signature: &'a str,

    /// `header.claims` exactly as received.
    pub signing_input: &'a str,
}

/// Protected header fields the gate relies on.
///
/// Values are raw strings; mapping `alg` onto a supported algorithm is the
/// caller's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtHeader {
    /// Declared signing algorithm (e.g. "RS256").
    pub alg: String,

    /// Key ID used to select the verification key.
    pub kid: String,

    /// Optional media type ("JWT" or "at+jwt").
    pub typ: Option<String>,
}

// =============================================================================
// Functions
// =============================================================================

/// Split a compact JWT into its three segments without decoding anything.
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Not exactly three dot-separated, non-empty segments
pub fn split_token(token: &str) -> Result<TokenSegments<'_>, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let parts = token.split('.').count();
    if parts != 3 {
        tracing::debug!(
            target: "common.jwt",
            parts = parts,
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    let (signing_input, signature) = token
        .rsplit_once('.')
        .ok_or(JwtValidationError::MalformedToken)?;
    let (header, claims) = signing_input
        .split_once('.')
        .ok_or(JwtValidationError::MalformedToken)?;

    if header.is_empty() || claims.is_empty() || signature.is_empty() {
        tracing::debug!(target: "common.jwt", "Token rejected: empty segment");
        return Err(JwtValidationError::MalformedToken);
    }

    Ok(TokenSegments {
        header,
        claims,
        signature,
        signing_input,
    })
}

/// Decode a base64url (unpadded) segment holding a JSON value.
///
/// # Errors
///
/// Returns `MalformedToken` if the segment is not base64url or the JSON does
/// not deserialize into `T`.
pub fn decode_json_segment<T: DeserializeOwned>(segment: &str) -> Result<T, JwtValidationError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT segment base64");
        JwtValidationError::MalformedToken
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT segment JSON");
        JwtValidationError::MalformedToken
    })
}

/// Decode the protected header and pull out `alg`, `kid` and `typ`.
///
/// # Security
///
/// - This function does NOT validate the token signature
/// - The `kid` value should only be used for key lookup in a trusted JWKS
///
/// # Errors
///
/// - `MalformedToken` - Header is not a base64url JSON object
/// - `MissingAlg` - `alg` is absent, not a string, or empty
/// - `MissingKid` - `kid` is absent, not a string, or empty
pub fn decode_header(segment: &str) -> Result<JwtHeader, JwtValidationError> {
    let header: serde_json::Value = decode_json_segment(segment)?;
    if !header.is_object() {
        tracing::debug!(target: "common.jwt", "JWT header is not a JSON object");
        return Err(JwtValidationError::MalformedToken);
    }

    // Empty strings count as absent
    let string_field = |name: &str| {
        header
            .get(name)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
    };

    let alg = string_field("alg").ok_or(JwtValidationError::MissingAlg)?;
    let kid = string_field("kid").ok_or(JwtValidationError::MissingKid)?;
    let typ = string_field("typ");

    Ok(JwtHeader { alg, kid, typ })
}

/// Validate the `iat` (issued-at) claim against `now` with clock skew tolerance.
///
/// Tokens issued further in the future than the skew allows are rejected.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if `iat > now + clock_skew`.
pub fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // Safe cast: clock_skew is bounded to MAX_CLOCK_SKEW (600 seconds), well within i64 range
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now.saturating_add(clock_skew_secs);

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_possible_wrap)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn encode(json: &str) -> String {
        URL_SAFE_NO_PAD.encode(json)
    }

    // -------------------------------------------------------------------------
    // Constants Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_max_jwt_size_is_8kb() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
    }

    #[test]
    fn test_clock_skew_bounds() {
        assert_eq!(DEFAULT_CLOCK_SKEW, Duration::from_secs(300));
        assert_eq!(MAX_CLOCK_SKEW, Duration::from_secs(600));
    }

    // -------------------------------------------------------------------------
    // split_token Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_split_token_preserves_signing_input() {
        let segments = split_token("aaa.bbb.ccc").unwrap();

        assert_eq!(segments.header, "aaa");
        assert_eq!(segments.claims, "bbb");
        assert_eq!(segments.signature, "ccc");
        assert_eq!(segments.signing_input, "aaa.bbb");
    }

    #[test]
    fn test_split_token_wrong_segment_count() {
        assert_eq!(
            split_token("not.a.valid.jwt.format"),
            Err(JwtValidationError::MalformedToken)
        );
        assert_eq!(split_token("only.two"), Err(JwtValidationError::MalformedToken));
        assert_eq!(split_token("single"), Err(JwtValidationError::MalformedToken));
        assert_eq!(split_token(""), Err(JwtValidationError::MalformedToken));
    }

    #[test]
    fn test_split_token_empty_segments() {
        assert_eq!(split_token(".b.c"), Err(JwtValidationError::MalformedToken));
        assert_eq!(split_token("a..c"), Err(JwtValidationError::MalformedToken));
        assert_eq!(split_token("a.b."), Err(JwtValidationError::MalformedToken));
        assert_eq!(split_token(".."), Err(JwtValidationError::MalformedToken));
    }

    #[test]
    fn test_split_token_oversized() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(
            split_token(&oversized),
            Err(JwtValidationError::TokenTooLarge)
        );
    }

    #[test]
    fn test_split_token_at_size_limit() {
        let remaining = MAX_JWT_SIZE_BYTES - 2; // two dots
        let header_len = remaining / 3;
        let claims_len = remaining / 3;
        let sig_len = remaining - header_len - claims_len;
        let token = format!(
            "{}.{}.{}",
            "a".repeat(header_len),
            "b".repeat(claims_len),
            "c".repeat(sig_len)
        );
        assert_eq!(token.len(), MAX_JWT_SIZE_BYTES);

        assert!(split_token(&token).is_ok(), "Token at size limit should be accepted");
    }

    // -------------------------------------------------------------------------
    // decode_header Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_decode_header_valid() {
        let header = decode_header(&encode(r#"{"alg":"RS256","typ":"JWT","kid":"key1"}"#)).unwrap();

        assert_eq!(header.alg, "RS256");
        assert_eq!(header.kid, "key1");
        assert_eq!(header.typ.as_deref(), Some("JWT"));
    }

    #[test]
    fn test_decode_header_missing_kid() {
        let result = decode_header(&encode(r#"{"alg":"RS256","typ":"JWT"}"#));
        assert_eq!(result, Err(JwtValidationError::MissingKid));
    }

    #[test]
    fn test_decode_header_missing_alg() {
        let result = decode_header(&encode(r#"{"kid":"key1"}"#));
        assert_eq!(result, Err(JwtValidationError::MissingAlg));
    }

    #[test]
    fn test_decode_header_rejects_non_string_and_empty_kid() {
        for header in [
            r#"{"alg":"RS256","kid":12345}"#,
            r#"{"alg":"RS256","kid":null}"#,
            r#"{"alg":"RS256","kid":""}"#,
        ] {
            assert_eq!(
                decode_header(&encode(header)),
                Err(JwtValidationError::MissingKid),
                "header {header} should be rejected"
            );
        }
    }

    #[test]
    fn test_decode_header_invalid_base64() {
        assert_eq!(
            decode_header("!!!invalid!!!"),
            Err(JwtValidationError::MalformedToken)
        );
    }

    #[test]
    fn test_decode_header_invalid_json() {
        assert_eq!(
            decode_header(&encode("not json")),
            Err(JwtValidationError::MalformedToken)
        );
    }

    #[test]
    fn test_decode_header_not_an_object() {
        assert_eq!(
            decode_header(&encode(r#"["RS256","key1"]"#)),
            Err(JwtValidationError::MalformedToken)
        );
    }

    #[test]
    fn test_decode_header_rejects_padded_base64() {
        // Standard padding is not part of the compact serialization
        let padded = base64::engine::general_purpose::URL_SAFE.encode(r#"{"alg":"RS256","kid":"k"}"#);
        assert!(padded.ends_with('='));
        assert_eq!(decode_header(&padded), Err(JwtValidationError::MalformedToken));
    }

    // -------------------------------------------------------------------------
    // decode_json_segment Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_decode_json_segment_typed() {
        #[derive(Deserialize)]
        struct Payload {
            exp: i64,
        }

        let payload: Payload = decode_json_segment(&encode(r#"{"exp":1700000000}"#)).unwrap();
        assert_eq!(payload.exp, 1_700_000_000);

        let wrong_type: Result<Payload, _> = decode_json_segment(&encode(r#"{"exp":"soon"}"#));
        assert_eq!(wrong_type.err(), Some(JwtValidationError::MalformedToken));
    }

    // -------------------------------------------------------------------------
    // validate_iat Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_validate_iat_at_past_and_present() {
        let now = 1_700_000_000_i64;
        assert!(validate_iat_at(now, DEFAULT_CLOCK_SKEW, now).is_ok());
        assert!(validate_iat_at(now - 3600, DEFAULT_CLOCK_SKEW, now).is_ok());
        assert_eq!(
            validate_iat_at(now + 86_400, DEFAULT_CLOCK_SKEW, now),
            Err(JwtValidationError::IatTooFarInFuture)
        );
    }

    #[test]
    fn test_validate_iat_at_boundary_exact() {
        let now = 1_700_000_000_i64;

        // iat == now + skew is the last accepted value
        assert!(validate_iat_at(now + 300, DEFAULT_CLOCK_SKEW, now).is_ok());

        // iat == now + skew + 1 is the first rejected value
        assert_eq!(
            validate_iat_at(now + 301, DEFAULT_CLOCK_SKEW, now),
            Err(JwtValidationError::IatTooFarInFuture)
        );
    }
}
