//! Authorization gate configuration.
//!
//! Configuration is loaded from environment variables.

use crate::auth::jwks::{DEFAULT_CACHE_TTL_SECONDS, DEFAULT_FETCH_TIMEOUT_SECONDS};
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Upper bound for a single JWKS fetch in seconds.
pub const MAX_FETCH_TIMEOUT_SECONDS: u64 = 60;

/// Path of the JWKS document relative to the issuer.
const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Authorization gate configuration.
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Expected `iss` claim, matched exactly.
    pub issuer: String,

    /// Audience that the `aud` claim must equal or contain.
    pub audience: String,

    /// URL of the issuer's JWKS document.
    pub jwks_url: String,

    /// Maximum age of a cached key set in seconds.
    pub jwks_cache_ttl_seconds: u64,

    /// Upper bound on one JWKS fetch in seconds.
    pub jwks_fetch_timeout_seconds: u64,

    /// Background refresh interval in seconds; 0 disables the refresher.
    pub jwks_refresh_interval_seconds: u64,

    /// Tolerance for `iat` in the future, in seconds.
    pub jwt_clock_skew_seconds: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWKS configuration: {0}")]
    InvalidJwks(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),
}

fn required_var(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

/// Keys must come over HTTPS; plain HTTP is only allowed to a loopback host.
fn check_jwks_url(jwks_url: &str) -> Result<(), ConfigError> {
    let url = reqwest::Url::parse(jwks_url)
        .map_err(|e| ConfigError::InvalidJwks(format!("AUTH_JWKS_URL is not a valid URL: {e}")))?;

    let loopback = url.host_str().is_some_and(|host| {
        host.eq_ignore_ascii_case("localhost")
            || host
                .trim_matches(|c| c == '[' || c == ']')
                .parse::<IpAddr>()
                .is_ok_and(|ip| ip.is_loopback())
    });

    match url.scheme() {
        "https" => Ok(()),
        "http" if loopback => Ok(()),
        scheme => Err(ConfigError::InvalidJwks(format!(
            "AUTH_JWKS_URL must use https, got '{scheme}://{}'",
            url.host_str().unwrap_or_default()
        ))),
    }
}

/// Parse an optional seconds value bounded to `min..=max`.
fn seconds_var(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
    min: u64,
    max: Option<u64>,
    error: fn(String) -> ConfigError,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: i64 = value_str.trim().parse().map_err(|e| {
        error(format!(
            "{name} must be a valid integer, got '{value_str}': {e}"
        ))
    })?;

    let value = u64::try_from(value)
        .ok()
        .filter(|v| *v >= min)
        .ok_or_else(|| {
            if min == 0 {
                error(format!("{name} must not be negative, got {value}"))
            } else {
                error(format!("{name} must be positive, got {value}"))
            }
        })?;

    if let Some(max) = max {
        if value > max {
            return Err(error(format!(
                "{name} must not exceed {max} seconds, got {value}"
            )));
        }
    }

    Ok(value)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let issuer = required_var(vars, "AUTH_ISSUER")?;
        let audience = required_var(vars, "AUTH_AUDIENCE")?;

        // Auth0 style issuers end with '/', the JWKS lives under the same origin
        let jwks_url = vars
            .get("AUTH_JWKS_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| format!("{}{JWKS_PATH}", issuer.trim_end_matches('/')));
        check_jwks_url(&jwks_url)?;

        let jwks_cache_ttl_seconds = seconds_var(
            vars,
            "JWKS_CACHE_TTL_SECONDS",
            DEFAULT_CACHE_TTL_SECONDS,
            1,
            None,
            ConfigError::InvalidJwks,
        )?;

        let jwks_fetch_timeout_seconds = seconds_var(
            vars,
            "JWKS_FETCH_TIMEOUT_SECONDS",
            DEFAULT_FETCH_TIMEOUT_SECONDS,
            1,
            Some(MAX_FETCH_TIMEOUT_SECONDS),
            ConfigError::InvalidJwks,
        )?;

        let jwks_refresh_interval_seconds = seconds_var(
            vars,
            "JWKS_REFRESH_INTERVAL_SECONDS",
            0,
            0,
            None,
            ConfigError::InvalidJwks,
        )?;

        let jwt_clock_skew_seconds = seconds_var(
            vars,
            "JWT_CLOCK_SKEW_SECONDS",
            DEFAULT_CLOCK_SKEW.as_secs(),
            1,
            Some(MAX_CLOCK_SKEW.as_secs()),
            ConfigError::InvalidJwtClockSkew,
        )?;

        Ok(Config {
            bind_address,
            issuer,
            audience,
            jwks_url,
            jwks_cache_ttl_seconds,
            jwks_fetch_timeout_seconds,
            jwks_refresh_interval_seconds,
            jwt_clock_skew_seconds,
        })
    }

    pub fn jwks_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_cache_ttl_seconds)
    }

    pub fn jwks_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.jwks_fetch_timeout_seconds)
    }

    /// `None` when the background refresher is disabled.
    pub fn jwks_refresh_interval(&self) -> Option<Duration> {
        (self.jwks_refresh_interval_seconds > 0)
            .then(|| Duration::from_secs(self.jwks_refresh_interval_seconds))
    }

    pub fn jwt_clock_skew(&self) -> Duration {
        Duration::from_secs(self.jwt_clock_skew_seconds)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "AUTH_ISSUER".to_string(),
                "https://coffee-shop.eu.auth0.com/".to_string(),
            ),
            ("AUTH_AUDIENCE".to_string(), "drinks".to_string()),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.issuer, "https://coffee-shop.eu.auth0.com/");
        assert_eq!(config.audience, "drinks");
        assert_eq!(
            config.jwks_url,
            "https://coffee-shop.eu.auth0.com/.well-known/jwks.json"
        );
        assert_eq!(config.jwks_cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.jwks_fetch_timeout(), Duration::from_secs(10));
        assert_eq!(config.jwks_refresh_interval(), None);
        assert_eq!(config.jwt_clock_skew(), DEFAULT_CLOCK_SKEW);
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());
        vars.insert(
            "AUTH_JWKS_URL".to_string(),
            "http://localhost:8082/keys".to_string(),
        );
        vars.insert("JWKS_CACHE_TTL_SECONDS".to_string(), "60".to_string());
        vars.insert("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "3".to_string());
        vars.insert("JWKS_REFRESH_INTERVAL_SECONDS".to_string(), "45".to_string());
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "120".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.jwks_url, "http://localhost:8082/keys");
        assert_eq!(config.jwks_cache_ttl_seconds, 60);
        assert_eq!(config.jwks_fetch_timeout_seconds, 3);
        assert_eq!(config.jwks_refresh_interval(), Some(Duration::from_secs(45)));
        assert_eq!(config.jwt_clock_skew_seconds, 120);
    }

    #[test]
    fn test_jwks_url_default_without_trailing_slash() {
        let mut vars = base_vars();
        vars.insert("AUTH_ISSUER".to_string(), "https://issuer.example".to_string());

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.jwks_url, "https://issuer.example/.well-known/jwks.json");
    }

    #[test]
    fn test_from_vars_missing_issuer() {
        let mut vars = base_vars();
        vars.remove("AUTH_ISSUER");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "AUTH_ISSUER"));
    }

    #[test]
    fn test_from_vars_blank_audience_is_missing() {
        let mut vars = base_vars();
        vars.insert("AUTH_AUDIENCE".to_string(), "   ".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "AUTH_AUDIENCE"));
    }

    #[test]
    fn test_cache_ttl_rejects_zero() {
        let mut vars = base_vars();
        vars.insert("JWKS_CACHE_TTL_SECONDS".to_string(), "0".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwks(msg)) if msg.contains("must be positive"))
        );
    }

    #[test]
    fn test_fetch_timeout_rejects_too_large() {
        let mut vars = base_vars();
        vars.insert("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "61".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwks(msg)) if msg.contains("must not exceed 60"))
        );
    }

    #[test]
    fn test_refresh_interval_rejects_negative() {
        let mut vars = base_vars();
        vars.insert("JWKS_REFRESH_INTERVAL_SECONDS".to_string(), "-5".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwks(msg)) if msg.contains("must not be negative"))
        );
    }

    #[test]
    fn test_jwt_clock_skew_rejects_zero() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "0".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwtClockSkew(msg)) if msg.contains("must be positive"))
        );
    }

    #[test]
    fn test_jwt_clock_skew_rejects_too_large() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "601".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwtClockSkew(msg)) if msg.contains("must not exceed 600"))
        );
    }

    #[test]
    fn test_jwt_clock_skew_accepts_max() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "600".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");
        assert_eq!(config.jwt_clock_skew_seconds, 600);
    }

    #[test]
    fn test_jwt_clock_skew_rejects_non_numeric() {
        let mut vars = base_vars();
        vars.insert(
            "JWT_CLOCK_SKEW_SECONDS".to_string(),
            "five-minutes".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwtClockSkew(msg)) if msg.contains("must be a valid integer"))
        );
    }

    #[test]
    fn test_jwks_url_must_be_https() {
        for url in [
            "http://issuer.example/.well-known/jwks.json",
            "http://10.0.0.5:8080/keys",
            "ftp://issuer.example/keys",
            "not a url",
        ] {
            let mut vars = base_vars();
            vars.insert("AUTH_JWKS_URL".to_string(), url.to_string());

            let result = Config::from_vars(&vars);
            assert!(
                matches!(result, Err(ConfigError::InvalidJwks(ref msg)) if msg.contains("AUTH_JWKS_URL")),
                "{url} should be rejected, got {result:?}"
            );
        }
    }

    #[test]
    fn test_jwks_url_allows_http_on_loopback() {
        for url in [
            "http://127.0.0.1:41000/.well-known/jwks.json",
            "http://localhost/keys",
            "http://[::1]:8082/keys",
        ] {
            let mut vars = base_vars();
            vars.insert("AUTH_JWKS_URL".to_string(), url.to_string());

            let config = Config::from_vars(&vars).expect("loopback JWKS URL should load");
            assert_eq!(config.jwks_url, url);
        }
    }

    #[test]
    fn test_default_jwks_url_follows_issuer_scheme() {
        let mut vars = base_vars();
        vars.insert("AUTH_ISSUER".to_string(), "http://issuer.example/".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidJwks(_))));
    }
}
