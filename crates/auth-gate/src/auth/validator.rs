//! Registered claim validation.

use crate::auth::claims::{permission_list, TokenClaims, VerifiedClaims};
use crate::errors::AuthError;
use common::jwt::{validate_iat_at, DEFAULT_CLOCK_SKEW};
use std::time::Duration;

/// Checks issuer, audience and the time-based claims of verified tokens.
#[derive(Debug, Clone)]
pub struct ClaimValidator {
    issuer: String,
    audience: String,
    clock_skew: Duration,
}

impl ClaimValidator {
    /// Create a validator.
    ///
    /// # Arguments
    ///
    /// * `issuer` - Exact expected `iss`
    /// * `audience` - Audience that `aud` must equal or contain
    /// * `clock_skew` - Tolerance for `iat` in the future
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>, clock_skew: Duration) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            clock_skew,
        }
    }

    /// Validator with the default clock skew.
    pub fn with_default_skew(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self::new(issuer, audience, DEFAULT_CLOCK_SKEW)
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Validate verified claims at `now` (Unix seconds).
    ///
    /// Checks run in a fixed order and the first failure is reported:
    /// required claims (`exp`, `iss`, `aud`, `permissions`), expiry,
    /// not-before, issued-at, issuer, audience.
    ///
    /// # Errors
    ///
    /// - `AuthError::MissingClaim` - a required claim is absent
    /// - `AuthError::TokenExpired` - `exp <= now`
    /// - `AuthError::TokenNotYetValid` - `nbf > now` or `iat` beyond the clock skew
    /// - `AuthError::IssuerMismatch` / `AuthError::AudienceMismatch`
    pub fn validate(&self, claims: VerifiedClaims, now: i64) -> Result<TokenClaims, AuthError> {
        let raw = claims.into_raw();

        let missing = |name: &'static str| {
            tracing::debug!(target: "gate.auth.validator", claim = name, "Token rejected: required claim missing");
            AuthError::MissingClaim(name)
        };
        let exp = raw.exp.ok_or_else(|| missing("exp"))?;
        let iss = raw.iss.ok_or_else(|| missing("iss"))?;
        let aud = raw.aud.ok_or_else(|| missing("aud"))?;
        let permissions = raw.permissions.ok_or_else(|| missing("permissions"))?;

        if exp <= now {
            tracing::debug!(target: "gate.auth.validator", exp = exp, now = now, "Token rejected: expired");
            return Err(AuthError::TokenExpired);
        }

        if let Some(nbf) = raw.nbf {
            if now < nbf {
                tracing::debug!(target: "gate.auth.validator", nbf = nbf, now = now, "Token rejected: not yet valid");
                return Err(AuthError::TokenNotYetValid);
            }
        }

        if let Some(iat) = raw.iat {
            validate_iat_at(iat, self.clock_skew, now).map_err(|_| AuthError::TokenNotYetValid)?;
        }

        if iss != self.issuer {
            tracing::debug!(target: "gate.auth.validator", iss = %iss, "Token rejected: unexpected issuer");
            return Err(AuthError::IssuerMismatch);
        }

        if !aud.contains(&self.audience) {
            tracing::debug!(target: "gate.auth.validator", aud = ?aud, "Token rejected: audience mismatch");
            return Err(AuthError::AudienceMismatch);
        }

        Ok(TokenClaims {
            iss,
            sub: raw.sub,
            aud,
            exp,
            nbf: raw.nbf,
            iat: raw.iat,
            permissions: permission_list(&permissions),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::auth::claims::{Audience, RawClaims, UnverifiedClaims};
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;
    const ISSUER: &str = "https://coffee-shop.example/";
    const AUDIENCE: &str = "drinks";

    fn validator() -> ClaimValidator {
        ClaimValidator::with_default_skew(ISSUER, AUDIENCE)
    }

    fn verified(value: serde_json::Value) -> VerifiedClaims {
        let raw: RawClaims = serde_json::from_value(value).unwrap();
        UnverifiedClaims::new(raw).into_verified()
    }

    fn valid_claims() -> serde_json::Value {
        json!({
            "iss": ISSUER,
            "sub": "auth0|barista",
            "aud": AUDIENCE,
            "exp": NOW + 600,
            "iat": NOW - 10,
            "permissions": ["get:drinks-detail", "post:drinks"],
        })
    }

    fn with(mut claims: serde_json::Value, key: &str, value: serde_json::Value) -> serde_json::Value {
        claims[key] = value;
        claims
    }

    fn without(mut claims: serde_json::Value, key: &str) -> serde_json::Value {
        claims.as_object_mut().unwrap().remove(key);
        claims
    }

    #[test]
    fn test_validate_accepts_valid_claims() {
        let claims = validator().validate(verified(valid_claims()), NOW).unwrap();

        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.sub.as_deref(), Some("auth0|barista"));
        assert_eq!(claims.aud, Audience::Single(AUDIENCE.to_string()));
        assert_eq!(claims.exp, NOW + 600);
        assert!(claims.has_permission("post:drinks"));
    }

    #[test]
    fn test_validate_missing_claims_in_order() {
        for (removed, expected) in [
            (vec!["exp", "iss", "aud", "permissions"], "exp"),
            (vec!["iss", "aud", "permissions"], "iss"),
            (vec!["aud", "permissions"], "aud"),
            (vec!["permissions"], "permissions"),
        ] {
            let mut claims = valid_claims();
            for key in &removed {
                claims = without(claims, key);
            }
            assert_eq!(
                validator().validate(verified(claims), NOW).err(),
                Some(AuthError::MissingClaim(expected))
            );
        }
    }

    #[test]
    fn test_validate_expiry_is_strict() {
        let at_now = with(valid_claims(), "exp", json!(NOW));
        assert_eq!(
            validator().validate(verified(at_now), NOW).err(),
            Some(AuthError::TokenExpired)
        );

        let just_valid = with(valid_claims(), "exp", json!(NOW + 1));
        assert!(validator().validate(verified(just_valid), NOW).is_ok());
    }

    #[test]
    fn test_validate_expired_before_issuer_check() {
        let claims = with(
            with(valid_claims(), "exp", json!(NOW - 10)),
            "iss",
            json!("https://evil.example/"),
        );
        assert_eq!(
            validator().validate(verified(claims), NOW).err(),
            Some(AuthError::TokenExpired)
        );
    }

    #[test]
    fn test_validate_not_before() {
        let future = with(valid_claims(), "nbf", json!(NOW + 1));
        assert_eq!(
            validator().validate(verified(future), NOW).err(),
            Some(AuthError::TokenNotYetValid)
        );

        let boundary = with(valid_claims(), "nbf", json!(NOW));
        assert!(validator().validate(verified(boundary), NOW).is_ok());
    }

    #[test]
    fn test_validate_issued_in_future() {
        let within_skew = with(valid_claims(), "iat", json!(NOW + 300));
        assert!(validator().validate(verified(within_skew), NOW).is_ok());

        let beyond_skew = with(valid_claims(), "iat", json!(NOW + 301));
        assert_eq!(
            validator().validate(verified(beyond_skew), NOW).err(),
            Some(AuthError::TokenNotYetValid)
        );
    }

    #[test]
    fn test_validate_issuer_exact_match() {
        let trailing = with(valid_claims(), "iss", json!("https://coffee-shop.example"));
        assert_eq!(
            validator().validate(verified(trailing), NOW).err(),
            Some(AuthError::IssuerMismatch)
        );
    }

    #[test]
    fn test_validate_issuer_checked_before_audience() {
        let claims = with(
            with(valid_claims(), "iss", json!("https://evil.example/")),
            "aud",
            json!("other"),
        );
        assert_eq!(
            validator().validate(verified(claims), NOW).err(),
            Some(AuthError::IssuerMismatch)
        );
    }

    #[test]
    fn test_validate_audience_list() {
        let contains = with(valid_claims(), "aud", json!(["api", AUDIENCE]));
        assert!(validator().validate(verified(contains), NOW).is_ok());

        let lacks = with(valid_claims(), "aud", json!(["api", "admin"]));
        assert_eq!(
            validator().validate(verified(lacks), NOW).err(),
            Some(AuthError::AudienceMismatch)
        );
    }

    #[test]
    fn test_validate_keeps_malformed_permissions_for_checker() {
        let claims = with(valid_claims(), "permissions", json!("post:drinks"));
        let claims = validator().validate(verified(claims), NOW).unwrap();
        assert_eq!(claims.permissions, None);
    }
}
