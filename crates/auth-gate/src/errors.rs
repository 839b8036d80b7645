//! Authorization gate error types.
//!
//! Every failure inside the token pipeline is classified at its origin into
//! exactly one [`AuthError`] variant. Each variant carries a machine-readable
//! code, a human-readable description (its `Display`), and a suggested HTTP
//! status: 401 for anything about who the caller is, 403 for what the caller
//! may do.
//!
//! Descriptions never echo token contents. Details are logged server-side at
//! the point of failure.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Realm advertised in `WWW-Authenticate` challenges.
const REALM: &str = "drinks-api";

/// Authorization failure taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Authorization header is expected")]
    AuthHeaderMissing,

    #[error("Authorization header is malformed: {0}")]
    AuthHeaderMalformed(&'static str),

    #[error("Unable to parse authentication token")]
    MalformedToken,

    #[error("Unable to find the appropriate signing key")]
    KeyNotFound,

    #[error("Signing keys are temporarily unavailable")]
    KeySourceUnavailable,

    #[error("Token algorithm does not match the signing key")]
    AlgorithmMismatch,

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token is not valid yet")]
    TokenNotYetValid,

    #[error("Incorrect claims, please check the issuer")]
    IssuerMismatch,

    #[error("Incorrect claims, please check the audience")]
    AudienceMismatch,

    #[error("Required claim is missing: {0}")]
    MissingClaim(&'static str),

    #[error("Permissions not included in token")]
    PermissionsClaimMissing,

    #[error("Permission not found")]
    PermissionDenied,
}

impl AuthError {
    /// Machine-readable error code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::AuthHeaderMissing => "authorization_header_missing",
            AuthError::AuthHeaderMalformed(_) => "invalid_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::KeyNotFound => "key_not_found",
            AuthError::KeySourceUnavailable => "key_source_unavailable",
            AuthError::AlgorithmMismatch => "algorithm_mismatch",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::IssuerMismatch => "invalid_issuer",
            AuthError::AudienceMismatch => "invalid_audience",
            AuthError::MissingClaim(_) => "missing_claim",
            AuthError::PermissionsClaimMissing => "permissions_missing",
            AuthError::PermissionDenied => "permission_denied",
        }
    }

    /// Suggested transport status code.
    ///
    /// Key source outages are reported as 401, never 5xx.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::PermissionsClaimMissing | AuthError::PermissionDenied => 403,
            _ => 401,
        }
    }

    /// Human-readable description.
    pub fn description(&self) -> String {
        self.to_string()
    }

    /// `WWW-Authenticate` challenge per RFC 6750 section 3.
    fn challenge(&self) -> String {
        match self {
            // No credentials were presented, so no error attribute.
            AuthError::AuthHeaderMissing => format!("Bearer realm=\"{REALM}\""),
            AuthError::AuthHeaderMalformed(_) => {
                format!("Bearer realm=\"{REALM}\", error=\"invalid_request\"")
            }
            AuthError::PermissionsClaimMissing | AuthError::PermissionDenied => {
                format!("Bearer realm=\"{REALM}\", error=\"insufficient_scope\"")
            }
            _ => format!("Bearer realm=\"{REALM}\", error=\"invalid_token\""),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: u16,
    code: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::UNAUTHORIZED);

        let body = ErrorResponse {
            success: false,
            error: status.as_u16(),
            code: self.code(),
            message: self.description(),
        };

        let mut response = (status, Json(body)).into_response();

        if let Ok(value) = HeaderValue::from_str(&self.challenge()) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, value);
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    // Helper function to read the response body as JSON
    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn all_variants() -> Vec<AuthError> {
        vec![
            AuthError::AuthHeaderMissing,
            AuthError::AuthHeaderMalformed("Token not found"),
            AuthError::MalformedToken,
            AuthError::KeyNotFound,
            AuthError::KeySourceUnavailable,
            AuthError::AlgorithmMismatch,
            AuthError::InvalidSignature,
            AuthError::TokenExpired,
            AuthError::TokenNotYetValid,
            AuthError::IssuerMismatch,
            AuthError::AudienceMismatch,
            AuthError::MissingClaim("exp"),
            AuthError::PermissionsClaimMissing,
            AuthError::PermissionDenied,
        ]
    }

    #[test]
    fn test_status_codes_split_authentication_from_authorization() {
        for error in all_variants() {
            let expected = match error {
                AuthError::PermissionsClaimMissing | AuthError::PermissionDenied => 403,
                _ => 401,
            };
            assert_eq!(error.status_code(), expected, "{error:?}");
        }
    }

    #[test]
    fn test_codes_are_unique() {
        let mut codes: Vec<&str> = all_variants().iter().map(AuthError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all_variants().len());
    }

    #[test]
    fn test_display_includes_detail() {
        assert_eq!(
            AuthError::AuthHeaderMalformed("Token not found").to_string(),
            "Authorization header is malformed: Token not found"
        );
        assert_eq!(
            AuthError::MissingClaim("aud").to_string(),
            "Required claim is missing: aud"
        );
        assert_eq!(AuthError::TokenExpired.description(), "Token expired");
    }

    #[tokio::test]
    async fn test_into_response_unauthorized() {
        let response = AuthError::TokenExpired.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let www_auth = response
            .headers()
            .get("WWW-Authenticate")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert_eq!(
            www_auth,
            "Bearer realm=\"drinks-api\", error=\"invalid_token\""
        );

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["success"], false);
        assert_eq!(body_json["error"], 401);
        assert_eq!(body_json["code"], "token_expired");
        assert_eq!(body_json["message"], "Token expired");
    }

    #[tokio::test]
    async fn test_into_response_missing_header_has_bare_challenge() {
        let response = AuthError::AuthHeaderMissing.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let www_auth = response.headers().get("WWW-Authenticate").unwrap();
        assert_eq!(www_auth, "Bearer realm=\"drinks-api\"");
    }

    #[tokio::test]
    async fn test_into_response_forbidden() {
        let response = AuthError::PermissionDenied.into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let www_auth = response.headers().get("WWW-Authenticate").unwrap();
        assert!(www_auth.to_str().unwrap().contains("insufficient_scope"));

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"], 403);
        assert_eq!(body_json["code"], "permission_denied");
        assert_eq!(body_json["message"], "Permission not found");
    }

    #[tokio::test]
    async fn test_into_response_key_source_outage_is_not_5xx() {
        let response = AuthError::KeySourceUnavailable.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["code"], "key_source_unavailable");
    }
}
