//! Authorization gate, the single entry point for protected operations.
//!
//! Protected operations call [`AuthorizationGate::authorize`] explicitly and
//! branch on the returned decision:
//!
//! ```rust,ignore
//! let claims = gate.authorize(auth_header, "post:drinks").await?;
//! ```

use crate::auth::claims::TokenClaims;
use crate::auth::decoder::decode;
use crate::auth::jwks::KeyCache;
use crate::auth::permissions::require_permission;
use crate::auth::validator::ClaimValidator;
use crate::auth::verifier::SignatureVerifier;
use crate::errors::AuthError;
use crate::observability::metrics::record_authorization;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Outcome of one authorization attempt.
pub type AuthDecision = Result<TokenClaims, AuthError>;

/// Extract the token from an `Authorization` header value.
///
/// The scheme is matched case-insensitively and must be followed by exactly
/// one whitespace-separated token.
///
/// # Errors
///
/// - `AuthError::AuthHeaderMissing` - no header
/// - `AuthError::AuthHeaderMalformed` - empty value, wrong scheme, no token or extra parts
pub fn extract_bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or_else(|| {
        tracing::debug!(target: "gate.auth.gate", "Missing Authorization header");
        AuthError::AuthHeaderMissing
    })?;

    let mut parts = header.split_whitespace();

    let Some(scheme) = parts.next() else {
        return Err(AuthError::AuthHeaderMalformed("Authorization header is empty"));
    };
    if !scheme.eq_ignore_ascii_case("bearer") {
        tracing::debug!(target: "gate.auth.gate", "Invalid Authorization header scheme");
        return Err(AuthError::AuthHeaderMalformed(
            "Authorization header must start with \"Bearer\"",
        ));
    }

    let Some(token) = parts.next() else {
        return Err(AuthError::AuthHeaderMalformed("Token not found"));
    };
    if parts.next().is_some() {
        return Err(AuthError::AuthHeaderMalformed(
            "Authorization header must be bearer token",
        ));
    }

    Ok(token)
}

/// Runs header parsing, decoding, signature verification, claim validation
/// and the permission check, stopping at the first failure.
pub struct AuthorizationGate {
    verifier: SignatureVerifier,
    validator: ClaimValidator,
}

impl AuthorizationGate {
    pub fn new(key_cache: Arc<KeyCache>, validator: ClaimValidator) -> Self {
        Self {
            verifier: SignatureVerifier::new(key_cache),
            validator,
        }
    }

    /// Authorize a request against the wall clock.
    ///
    /// # Errors
    ///
    /// Returns the first [`AuthError`] raised by any stage.
    pub async fn authorize(&self, header: Option<&str>, required_permission: &str) -> AuthDecision {
        self.authorize_at(header, required_permission, chrono::Utc::now().timestamp())
            .await
    }

    /// Authorize a request at an explicit time (Unix seconds).
    ///
    /// # Errors
    ///
    /// Returns the first [`AuthError`] raised by any stage.
    #[instrument(skip(self, header), fields(permission = %required_permission))]
    pub async fn authorize_at(
        &self,
        header: Option<&str>,
        required_permission: &str,
        now: i64,
    ) -> AuthDecision {
        let start = Instant::now();
        let decision = self.evaluate(header, required_permission, now).await;

        let outcome = match &decision {
            Ok(_) => "allowed",
            Err(e) => e.code(),
        };
        record_authorization(outcome, start.elapsed());

        match &decision {
            Ok(claims) => {
                tracing::debug!(
                    target: "gate.auth.gate",
                    exp = claims.exp,
                    "Request authorized"
                );
            }
            Err(e) => {
                tracing::info!(
                    target: "gate.auth.gate",
                    code = e.code(),
                    status = e.status_code(),
                    "Request rejected"
                );
            }
        }

        decision
    }

    /// Every stage except the permission check. Only reachable through
    /// `authorize_at`, which records the outcome.
    async fn authenticate(&self, header: Option<&str>, now: i64) -> AuthDecision {
        let token = extract_bearer_token(header)?;
        let decoded = decode(token)?;
        let verified = self.verifier.verify(decoded).await?;
        self.validator.validate(verified, now)
    }

    async fn evaluate(&self, header: Option<&str>, required_permission: &str, now: i64) -> AuthDecision {
        let claims = self.authenticate(header, now).await?;
        require_permission(&claims, required_permission)?;
        Ok(claims)
    }
}
