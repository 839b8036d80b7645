//! Builder patterns for test claims
//!
//! Produces claim sets that pass the gate by default, with knobs for each
//! failure mode.

use chrono::Utc;
use serde_json::{json, Map, Value};

/// Issuer the test gate expects.
pub const TEST_ISSUER: &str = "https://coffee-shop.test/";

/// Audience the test gate expects.
pub const TEST_AUDIENCE: &str = "drinks";

/// Builder for creating test JWT claims
///
/// # Example
/// ```rust,ignore
/// let claims = TestClaimsBuilder::new()
///     .subject("auth0|manager")
///     .with_permissions(&["get:drinks-detail", "delete:drinks"])
///     .expires_in(3600)
///     .build();
/// ```
pub struct TestClaimsBuilder {
    now: i64,
    claims: Map<String, Value>,
}

impl TestClaimsBuilder {
    /// Valid claims issued now, expiring in an hour, with no permissions.
    pub fn new() -> Self {
        Self::at(Utc::now().timestamp())
    }

    /// Valid claims relative to a fixed `now`.
    pub fn at(now: i64) -> Self {
        let mut claims = Map::new();
        claims.insert("iss".into(), json!(TEST_ISSUER));
        claims.insert("sub".into(), json!("auth0|test-barista"));
        claims.insert("aud".into(), json!(TEST_AUDIENCE));
        claims.insert("iat".into(), json!(now));
        claims.insert("exp".into(), json!(now + 3600));
        claims.insert("permissions".into(), json!([]));
        Self { now, claims }
    }

    pub fn issuer(self, issuer: &str) -> Self {
        self.set("iss", json!(issuer))
    }

    pub fn audience(self, audience: &str) -> Self {
        self.set("aud", json!(audience))
    }

    /// Audience as a list.
    pub fn audiences(self, audiences: &[&str]) -> Self {
        self.set("aud", json!(audiences))
    }

    pub fn subject(self, subject: &str) -> Self {
        self.set("sub", json!(subject))
    }

    pub fn with_permissions(self, permissions: &[&str]) -> Self {
        self.set("permissions", json!(permissions))
    }

    /// Raw `permissions` value, for malformed shapes.
    pub fn permissions_value(self, value: Value) -> Self {
        self.set("permissions", value)
    }

    pub fn expires_at(self, exp: i64) -> Self {
        self.set("exp", json!(exp))
    }

    /// Set expiration in seconds relative to `now` (negative for the past).
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = self.now + seconds;
        self.set("exp", json!(exp))
    }

    pub fn not_before(self, nbf: i64) -> Self {
        self.set("nbf", json!(nbf))
    }

    pub fn issued_at(self, iat: i64) -> Self {
        self.set("iat", json!(iat))
    }

    /// Drop a claim entirely.
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }

    fn set(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }
}

impl Default for TestClaimsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
