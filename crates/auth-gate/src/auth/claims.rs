//! JWT claims structures.
//!
//! Claims move through three stages, each its own type:
//!
//! 1. [`UnverifiedClaims`] - parsed from the token, opaque, fully redacted
//! 2. [`VerifiedClaims`] - signature checked, not yet validated
//! 3. [`TokenClaims`] - validated and safe to act upon
//!
//! Only the signature verifier can promote (1) to (2) and only the claim
//! validator can turn (2) into (3).

use serde::{Deserialize, Serialize};
use std::fmt;

/// The `aud` claim, a single audience or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    /// Exact, case-sensitive membership test.
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == audience,
            Audience::Multiple(auds) => auds.iter().any(|aud| aud == audience),
        }
    }
}

/// Claims set as it appears in the token.
///
/// Every registered claim is optional here; presence is enforced by the
/// validator so that the first missing claim can be named. `permissions` is
/// kept as raw JSON because a wrongly typed list is an authorization failure,
/// not a parse failure.
#[derive(Clone, Default, PartialEq, Deserialize)]
pub(crate) struct RawClaims {
    #[serde(default)]
    pub iss: Option<String>,

    #[serde(default)]
    pub sub: Option<String>,

    #[serde(default)]
    pub aud: Option<Audience>,

    #[serde(default)]
    pub exp: Option<i64>,

    #[serde(default)]
    pub nbf: Option<i64>,

    #[serde(default)]
    pub iat: Option<i64>,

    #[serde(default)]
    pub permissions: Option<serde_json::Value>,
}

/// Claims decoded from a token whose signature has not been checked.
///
/// No accessors. Debug output reveals nothing.
pub struct UnverifiedClaims(RawClaims);

impl UnverifiedClaims {
    pub(crate) fn new(raw: RawClaims) -> Self {
        Self(raw)
    }

    /// Promote after a successful signature check.
    pub(super) fn into_verified(self) -> VerifiedClaims {
        VerifiedClaims(self.0)
    }
}

impl fmt::Debug for UnverifiedClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UnverifiedClaims([REDACTED])")
    }
}

/// Claims whose signature verified over the exact bytes they came from.
pub struct VerifiedClaims(RawClaims);

impl VerifiedClaims {
    pub(super) fn into_raw(self) -> RawClaims {
        self.0
    }
}

impl fmt::Debug for VerifiedClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifiedClaims")
            .field("iss", &self.0.iss)
            .field("sub", &"[REDACTED]")
            .field("exp", &self.0.exp)
            .finish_non_exhaustive()
    }
}

/// Validated claims for an authenticated caller.
///
/// The `sub` field identifies a user or client and is redacted in Debug
/// output.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct TokenClaims {
    /// Issuer.
    pub iss: String,

    /// Subject - redacted in Debug output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Audience.
    pub aud: Audience,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Not-before timestamp (Unix epoch seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Granted permissions; `None` when the claim is not a list of strings.
    pub permissions: Option<Vec<String>>,
}

impl fmt::Debug for TokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenClaims")
            .field("iss", &self.iss)
            .field("sub", &"[REDACTED]")
            .field("aud", &self.aud)
            .field("exp", &self.exp)
            .field("nbf", &self.nbf)
            .field("iat", &self.iat)
            .field("permissions", &self.permissions)
            .finish()
    }
}

impl TokenClaims {
    /// Check whether the token grants a permission (exact match).
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .as_ref()
            .is_some_and(|perms| perms.iter().any(|p| p == permission))
    }
}

/// Interpret a raw `permissions` claim as a list of strings.
///
/// Returns `None` unless the value is an array whose every element is a
/// string. An empty array is a valid (empty) list.
pub(crate) fn permission_list(value: &serde_json::Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(ToString::to_string))
        .collect()
}
