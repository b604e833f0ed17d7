//! Key Rotation Store — round-robin over the configured LLM API keys with a
//! per-key cooldown after failure.
//!
//! One `KeyStore` is built at startup and shared as `Arc<KeyStore>` by every
//! evaluation pipeline. The rotation cursor and the cooldown map live behind a
//! single `Mutex`; no lock is ever held across an `.await`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_COOLDOWN_SECS: i64 = 300;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyStoreError {
    #[error("No active API keys available")]
    NoCredentialsAvailable,
}

#[derive(Debug, Default)]
struct Rotation {
    keys: Vec<String>,
    cursor: usize,
    failed_until: HashMap<String, DateTime<Utc>>,
}

impl Rotation {
    fn is_failed(&self, key: &str, now: DateTime<Utc>) -> bool {
        self.failed_until
            .get(key)
            .is_some_and(|until| now < *until)
    }

    fn advance(&mut self) {
        if !self.keys.is_empty() {
            self.cursor = (self.cursor + 1) % self.keys.len();
        }
    }

    fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.failed_until.len();
        self.failed_until.retain(|_, until| now < *until);
        before - self.failed_until.len()
    }
}

#[derive(Debug, Default)]
pub struct KeyStore {
    rotation: Mutex<Rotation>,
}

impl KeyStore {
    /// Builds a store over `keys` in the given order. Blank keys are ignored.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys = keys
            .into_iter()
            .map(Into::into)
            .map(|k: String| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            rotation: Mutex::new(Rotation {
                keys,
                ..Rotation::default()
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().keys.len()
    }

    /// True when every configured key was blank.
    pub fn is_empty(&self) -> bool {
        self.lock().keys.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Rotation> {
        self.rotation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the next usable key, starting from the rotation cursor.
    pub fn active(&self) -> Result<String, KeyStoreError> {
        self.active_at(Utc::now())
    }

    pub fn active_at(&self, now: DateTime<Utc>) -> Result<String, KeyStoreError> {
        let mut rotation = self.lock();
        let expired = rotation.sweep(now);
        if expired > 0 {
            debug!("{expired} API key(s) left cooldown");
        }

        for _ in 0..rotation.keys.len() {
            let key = &rotation.keys[rotation.cursor];
            if !rotation.is_failed(key, now) {
                return Ok(key.clone());
            }
            rotation.advance();
        }

        Err(KeyStoreError::NoCredentialsAvailable)
    }

    /// Cools `key` down until `now + cooldown` and moves the cursor on.
    pub fn mark_failed(&self, key: &str, cooldown: Duration) {
        self.mark_failed_at(key, cooldown, Utc::now());
    }

    pub fn mark_failed_at(&self, key: &str, cooldown: Duration, now: DateTime<Utc>) {
        let mut rotation = self.lock();
        rotation.failed_until.insert(key.to_string(), now + cooldown);
        rotation.advance();
        warn!(
            "Key {}... failed. Will retry after {} min.",
            key_prefix(key),
            cooldown.num_minutes()
        );
    }

    /// Pure check: true while `key` is inside its cooldown window.
    #[cfg(test)]
    pub fn is_failed(&self, key: &str) -> bool {
        self.is_failed_at(key, Utc::now())
    }

    #[cfg(test)]
    pub fn is_failed_at(&self, key: &str, now: DateTime<Utc>) -> bool {
        self.lock().is_failed(key, now)
    }

    /// Drops cooldown records that have expired. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        self.lock().sweep(now)
    }

    /// Number of keys with a cooldown record, expired or not.
    pub fn cooldown_records(&self) -> usize {
        self.lock().failed_until.len()
    }
}

/// First eight characters of a key, safe to log.
pub fn key_prefix(key: &str) -> String {
    key.chars().take(8).collect()
}
