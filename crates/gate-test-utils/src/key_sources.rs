//! In-memory [`KeySource`] for exercising the key cache without HTTP.

use async_trait::async_trait;
use auth_gate::auth::{KeySource, SigningKey};
use auth_gate::errors::AuthError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Serves a mutable key list and counts fetches.
#[derive(Default)]
pub struct CountingKeySource {
    keys: Mutex<Vec<SigningKey>>,
    fetches: AtomicUsize,
    fail: AtomicBool,
}

impl CountingKeySource {
    pub fn new(keys: Vec<SigningKey>) -> Self {
        Self {
            keys: Mutex::new(keys),
            ..Self::default()
        }
    }

    /// Replace the served keys, as a key rotation would.
    pub fn set_keys(&self, keys: Vec<SigningKey>) {
        *self.keys.lock().expect("key list lock poisoned") = keys;
    }

    /// Make every subsequent fetch fail with `KeySourceUnavailable`.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySource for CountingKeySource {
    async fn fetch_keys(&self) -> Result<Vec<SigningKey>, AuthError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AuthError::KeySourceUnavailable);
        }
        Ok(self.keys.lock().expect("key list lock poisoned").clone())
    }
}
