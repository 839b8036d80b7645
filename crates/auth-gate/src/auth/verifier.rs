//! Signature verification, the single trust boundary.

use crate::auth::claims::VerifiedClaims;
use crate::auth::decoder::DecodedToken;
use crate::auth::jwks::KeyCache;
use crate::errors::AuthError;
use std::sync::Arc;
use tracing::instrument;

/// Verifies token signatures against keys from the [`KeyCache`].
pub struct SignatureVerifier {
    key_cache: Arc<KeyCache>,
}

impl SignatureVerifier {
    pub fn new(key_cache: Arc<KeyCache>) -> Self {
        Self { key_cache }
    }

    /// Verify a decoded token and promote its claims.
    ///
    /// The key is selected by `kid` and must be bound to exactly the
    /// algorithm the header declares. The signature is checked over the
    /// signing input as transmitted.
    ///
    /// # Errors
    ///
    /// - `AuthError::KeyNotFound` / `AuthError::KeySourceUnavailable` - from the key lookup
    /// - `AuthError::AlgorithmMismatch` - header `alg` differs from the key's algorithm
    /// - `AuthError::InvalidSignature` - the signature does not verify
    #[instrument(skip_all, fields(kid = %token.header.kid, alg = ?token.header.alg))]
    pub async fn verify(&self, token: DecodedToken<'_>) -> Result<VerifiedClaims, AuthError> {
        let key = self.key_cache.get_key(&token.header.kid).await?;

        if key.algorithm() != token.header.alg {
            tracing::debug!(
                target: "gate.auth.verifier",
                key_alg = ?key.algorithm(),
                "Token rejected: algorithm does not match signing key"
            );
            return Err(AuthError::AlgorithmMismatch);
        }

        match jsonwebtoken::crypto::verify(
            token.signature,
            token.signing_input.as_bytes(),
            key.decoding_key(),
            key.algorithm(),
        ) {
            Ok(true) => Ok(token.claims.into_verified()),
            Ok(false) => {
                tracing::debug!(target: "gate.auth.verifier", "Token rejected: signature mismatch");
                Err(AuthError::InvalidSignature)
            }
            Err(e) => {
                tracing::debug!(target: "gate.auth.verifier", error = %e, "Token rejected: signature verification failed");
                Err(AuthError::InvalidSignature)
            }
        }
    }
}
