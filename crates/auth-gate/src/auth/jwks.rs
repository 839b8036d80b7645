//! Signing key retrieval and caching.
//!
//! A [`KeySource`] fetches the issuer's current public keys; the [`KeyCache`]
//! holds the most recent fetch and decides when to fetch again.
//!
//! # Security
//!
//! - Symmetric keys and keys not marked for signatures are never loaded
//! - A key is bound to exactly one algorithm when it is loaded
//! - Stale keys are never served; a failed refetch is an error
//! - The JWKS URL must be HTTPS unless it points at a loopback host

use crate::errors::AuthError;
use crate::observability::metrics::{record_jwks_fetch, record_key_lookup};
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Default cache max age in seconds (5 minutes).
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

/// Default bound on a single key fetch in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 10;

// =============================================================================
// JWK wire format
// =============================================================================

/// JSON Web Key as published by the issuer.
///
/// Every member is optional so one odd entry cannot poison the whole set;
/// [`SigningKey::from_jwk`] decides what is usable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA", "EC" or "OKP").
    #[serde(default)]
    pub kty: Option<String>,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// Algorithm the key is meant for.
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (must be "sig" when present).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// Curve name for EC and OKP keys.
    #[serde(default)]
    pub crv: Option<String>,

    /// Public x coordinate (EC) or public key (OKP), base64url.
    #[serde(default)]
    pub x: Option<String>,

    /// Public y coordinate (EC), base64url.
    #[serde(default)]
    pub y: Option<String>,
}

/// JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

/// Reasons a published key is not loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JwkError {
    #[error("key has no kid")]
    MissingKid,

    #[error("key use {0:?} is not \"sig\"")]
    UnsupportedUse(String),

    #[error("unsupported algorithm {0:?}")]
    UnsupportedAlgorithm(String),

    #[error("symmetric keys are not accepted")]
    SymmetricKey,

    #[error("unsupported key type {0:?}")]
    UnsupportedKeyType(String),

    #[error("unsupported curve {0:?}")]
    UnsupportedCurve(String),

    #[error("algorithm cannot be determined for this key")]
    AmbiguousAlgorithm,

    #[error("algorithm {alg:?} does not fit key type {kty}")]
    AlgorithmKeyMismatch { kty: String, alg: Algorithm },

    #[error("missing key parameter {0}")]
    MissingParameter(&'static str),

    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),
}

// =============================================================================
// SigningKey
// =============================================================================

/// A public verification key bound to one algorithm.
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    algorithm: Algorithm,
    key: DecodingKey,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

fn is_rsa(alg: Algorithm) -> bool {
    matches!(
        alg,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
    )
}

fn is_symmetric(alg: Algorithm) -> bool {
    matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

fn required<'a>(value: Option<&'a String>, name: &'static str) -> Result<&'a str, JwkError> {
    value
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or(JwkError::MissingParameter(name))
}

fn invalid_material(e: jsonwebtoken::errors::Error) -> JwkError {
    JwkError::InvalidKeyMaterial(e.to_string())
}

impl SigningKey {
    /// Create a signing key from an already decoded key.
    pub fn new(kid: impl Into<String>, algorithm: Algorithm, key: DecodingKey) -> Self {
        Self {
            kid: kid.into(),
            algorithm,
            key,
        }
    }

    /// Build a signing key from a published JWK.
    ///
    /// `alg` is inferred only where the key type leaves no choice
    /// (Ed25519, P-256, P-384). RSA keys must declare it.
    ///
    /// # Errors
    ///
    /// Returns a [`JwkError`] describing why the key is unusable.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, JwkError> {
        let kid = jwk
            .kid
            .as_deref()
            .filter(|kid| !kid.is_empty())
            .ok_or(JwkError::MissingKid)?;

        if let Some(key_use) = jwk.key_use.as_deref() {
            if key_use != "sig" {
                return Err(JwkError::UnsupportedUse(key_use.to_string()));
            }
        }

        let declared = match jwk.alg.as_deref() {
            Some(alg) => {
                let parsed = Algorithm::from_str(alg)
                    .map_err(|_| JwkError::UnsupportedAlgorithm(alg.to_string()))?;
                if is_symmetric(parsed) {
                    return Err(JwkError::SymmetricKey);
                }
                Some(parsed)
            }
            None => None,
        };

        let kty = jwk.kty.as_deref().unwrap_or_default();
        let mismatch = |alg| JwkError::AlgorithmKeyMismatch {
            kty: kty.to_string(),
            alg,
        };

        let (algorithm, key) = match kty {
            "RSA" => {
                let alg = declared.ok_or(JwkError::AmbiguousAlgorithm)?;
                if !is_rsa(alg) {
                    return Err(mismatch(alg));
                }
                let n = required(jwk.n.as_ref(), "n")?;
                let e = required(jwk.e.as_ref(), "e")?;
                let key = DecodingKey::from_rsa_components(n, e).map_err(invalid_material)?;
                (alg, key)
            }
            "EC" => {
                let curve_alg = match jwk.crv.as_deref() {
                    Some("P-256") => Algorithm::ES256,
                    Some("P-384") => Algorithm::ES384,
                    other => {
                        return Err(JwkError::UnsupportedCurve(
                            other.unwrap_or_default().to_string(),
                        ))
                    }
                };
                let alg = declared.unwrap_or(curve_alg);
                if alg != curve_alg {
                    return Err(mismatch(alg));
                }
                let x = required(jwk.x.as_ref(), "x")?;
                let y = required(jwk.y.as_ref(), "y")?;
                let key = DecodingKey::from_ec_components(x, y).map_err(invalid_material)?;
                (alg, key)
            }
            "OKP" => {
                if jwk.crv.as_deref() != Some("Ed25519") {
                    return Err(JwkError::UnsupportedCurve(
                        jwk.crv.clone().unwrap_or_default(),
                    ));
                }
                let alg = declared.unwrap_or(Algorithm::EdDSA);
                if alg != Algorithm::EdDSA {
                    return Err(mismatch(alg));
                }
                let x = required(jwk.x.as_ref(), "x")?;
                let key = DecodingKey::from_ed_components(x).map_err(invalid_material)?;
                (alg, key)
            }
            "oct" => return Err(JwkError::SymmetricKey),
            other => return Err(JwkError::UnsupportedKeyType(other.to_string())),
        };

        Ok(Self::new(kid, algorithm, key))
    }

    /// Key ID.
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// The only algorithm this key verifies.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

/// Turn a JWKS document into usable signing keys.
///
/// Unusable entries are skipped with a warning. When several usable
/// entries share a `kid` the first one wins.
pub fn signing_keys_from_jwks(jwks: &JwksResponse) -> Vec<SigningKey> {
    let mut keys: Vec<SigningKey> = Vec::with_capacity(jwks.keys.len());

    for jwk in &jwks.keys {
        match SigningKey::from_jwk(jwk) {
            Ok(key) => {
                if keys.iter().any(|k| k.kid == key.kid) {
                    tracing::warn!(target: "gate.auth.jwks", kid = %key.kid, "Duplicate kid in JWKS, keeping first");
                    continue;
                }
                keys.push(key);
            }
            Err(e) => {
                tracing::warn!(
                    target: "gate.auth.jwks",
                    kid = jwk.kid.as_deref().unwrap_or("<none>"),
                    error = %e,
                    "Skipping unusable JWKS entry"
                );
            }
        }
    }

    keys
}

// =============================================================================
// KeySource
// =============================================================================

/// Source of the issuer's current signing keys.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Fetch the full current key set.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeySourceUnavailable` if keys cannot be obtained or
    /// none of them is usable.
    async fn fetch_keys(&self) -> Result<Vec<SigningKey>, AuthError>;
}

/// Key source backed by an HTTP JWKS endpoint.
pub struct JwksKeySource {
    /// URL to the JWKS endpoint.
    jwks_url: String,

    /// HTTP client for fetching JWKS.
    http_client: reqwest::Client,
}

impl JwksKeySource {
    /// Create a JWKS key source.
    ///
    /// # Arguments
    ///
    /// * `jwks_url` - URL of the issuer's JWKS document
    /// * `timeout` - Upper bound on a single HTTP request
    pub fn new(jwks_url: String, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "gate.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
        }
    }

    /// URL this source fetches from.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }
}

#[async_trait]
impl KeySource for JwksKeySource {
    #[instrument(skip(self), fields(url = %self.jwks_url))]
    async fn fetch_keys(&self) -> Result<Vec<SigningKey>, AuthError> {
        tracing::debug!(target: "gate.auth.jwks", "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "gate.auth.jwks", error = %e, "Failed to fetch JWKS");
                AuthError::KeySourceUnavailable
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "gate.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(AuthError::KeySourceUnavailable);
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "gate.auth.jwks", error = %e, "Failed to parse JWKS response");
            AuthError::KeySourceUnavailable
        })?;

        let keys = signing_keys_from_jwks(&jwks);
        if keys.is_empty() {
            tracing::error!(
                target: "gate.auth.jwks",
                published = jwks.keys.len(),
                "JWKS contains no usable signing keys"
            );
            return Err(AuthError::KeySourceUnavailable);
        }

        Ok(keys)
    }
}

// =============================================================================
// KeyCache
// =============================================================================

/// One immutable fetch generation.
struct KeySet {
    keys: HashMap<String, SigningKey>,
    fetched_at: Instant,
    generation: u64,
}

/// Process-wide cache of signing keys.
///
/// Readers take a cheap `Arc` snapshot and release the lock immediately. A
/// refresh builds a complete new snapshot and swaps it in. Refetches are
/// serialized so that lookups missing at the same time share one fetch.
pub struct KeyCache {
    source: Arc<dyn KeySource>,
    snapshot: RwLock<Option<Arc<KeySet>>>,
    refresh_lock: Mutex<()>,
    /// Last generation handed out. Never reused, even across `invalidate`.
    generations: AtomicU64,
    max_age: Duration,
    fetch_timeout: Duration,
}

impl KeyCache {
    /// Create an empty cache with default max age and fetch timeout.
    pub fn new(source: Arc<dyn KeySource>) -> Self {
        Self::with_settings(
            source,
            Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS),
            Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECONDS),
        )
    }

    /// Create an empty cache.
    ///
    /// # Arguments
    ///
    /// * `source` - Where keys come from
    /// * `max_age` - Snapshots older than this are refetched before use
    /// * `fetch_timeout` - Upper bound on a single fetch
    pub fn with_settings(source: Arc<dyn KeySource>, max_age: Duration, fetch_timeout: Duration) -> Self {
        Self {
            source,
            snapshot: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            generations: AtomicU64::new(0),
            max_age,
            fetch_timeout,
        }
    }

    async fn current(&self) -> Option<Arc<KeySet>> {
        self.snapshot.read().await.clone()
    }

    fn is_fresh(&self, set: &KeySet) -> bool {
        set.fetched_at.elapsed() < self.max_age
    }

    /// Get the signing key for a `kid`.
    ///
    /// Serves from a fresh snapshot when possible; otherwise triggers at
    /// most one refetch before giving up.
    ///
    /// # Errors
    ///
    /// - `AuthError::KeyNotFound` - `kid` absent after the refetch
    /// - `AuthError::KeySourceUnavailable` - the refetch failed
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<SigningKey, AuthError> {
        let observed = self.current().await;

        if let Some(set) = observed.as_ref().filter(|set| self.is_fresh(set)) {
            if let Some(key) = set.keys.get(kid) {
                tracing::debug!(target: "gate.auth.jwks", "Key cache hit");
                record_key_lookup("hit");
                return Ok(key.clone());
            }
            tracing::debug!(target: "gate.auth.jwks", "Key not in cache, refetching");
        }

        let set = match self
            .refetch_unless_replaced(observed.map(|set| set.generation))
            .await
        {
            Ok(set) => set,
            Err(e) => {
                record_key_lookup("unavailable");
                return Err(e);
            }
        };

        if let Some(key) = set.keys.get(kid) {
            record_key_lookup("refetch_hit");
            return Ok(key.clone());
        }

        tracing::warn!(target: "gate.auth.jwks", "Key not found in JWKS after refresh");
        record_key_lookup("not_found");
        Err(AuthError::KeyNotFound)
    }

    /// Fetch a new snapshot unless another task already replaced the one
    /// this caller observed.
    async fn refetch_unless_replaced(&self, observed: Option<u64>) -> Result<Arc<KeySet>, AuthError> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(current) = self.current().await {
            if Some(current.generation) != observed {
                tracing::debug!(
                    target: "gate.auth.jwks",
                    generation = current.generation,
                    "Key set already refreshed by another task"
                );
                return Ok(current);
            }
        }

        self.fetch_and_swap().await
    }

    /// Caller must hold `refresh_lock`.
    async fn fetch_and_swap(&self) -> Result<Arc<KeySet>, AuthError> {
        let start = Instant::now();

        let fetched = match tokio::time::timeout(self.fetch_timeout, self.source.fetch_keys()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    target: "gate.auth.jwks",
                    timeout = ?self.fetch_timeout,
                    "Key fetch timed out"
                );
                record_jwks_fetch("timeout", start.elapsed());
                return Err(AuthError::KeySourceUnavailable);
            }
        };

        let keys = match fetched {
            Ok(keys) if !keys.is_empty() => keys,
            Ok(_) => {
                tracing::error!(target: "gate.auth.jwks", "Key source returned no keys");
                record_jwks_fetch("error", start.elapsed());
                return Err(AuthError::KeySourceUnavailable);
            }
            Err(e) => {
                record_jwks_fetch("error", start.elapsed());
                return Err(e);
            }
        };
        record_jwks_fetch("success", start.elapsed());

        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;

        let mut by_kid = HashMap::with_capacity(keys.len());
        for key in keys {
            by_kid.entry(key.kid.clone()).or_insert(key);
        }

        let set = Arc::new(KeySet {
            keys: by_kid,
            fetched_at: Instant::now(),
            generation,
        });

        tracing::info!(
            target: "gate.auth.jwks",
            key_count = set.keys.len(),
            generation = generation,
            "Key cache refreshed"
        );

        *self.snapshot.write().await = Some(Arc::clone(&set));
        Ok(set)
    }

    /// Unconditionally refetch and replace the key set.
    ///
    /// Used by the background refresher. On failure the previous snapshot
    /// stays in place and ages out normally.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeySourceUnavailable` if the fetch fails.
    pub async fn refresh(&self) -> Result<usize, AuthError> {
        let _guard = self.refresh_lock.lock().await;
        let set = self.fetch_and_swap().await?;
        Ok(set.keys.len())
    }

    /// Make sure a fresh snapshot is loaded, fetching only if needed.
    ///
    /// Returns the number of cached keys.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeySourceUnavailable` if a needed fetch fails.
    pub async fn ensure_populated(&self) -> Result<usize, AuthError> {
        let observed = self.current().await;
        if let Some(set) = observed.as_ref().filter(|set| self.is_fresh(set)) {
            return Ok(set.keys.len());
        }

        let set = self
            .refetch_unless_replaced(observed.map(|set| set.generation))
            .await?;
        Ok(set.keys.len())
    }

    /// Number of keys in the current snapshot, fresh or not.
    pub async fn key_count(&self) -> usize {
        self.current().await.map_or(0, |set| set.keys.len())
    }

    /// Drop the current snapshot so the next lookup refetches.
    pub async fn invalidate(&self) {
        *self.snapshot.write().await = None;
    }
}
