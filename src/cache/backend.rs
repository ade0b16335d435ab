//! Key/value cache backends with TTL expiry.
//!
//! [`CacheBackend`] is the seam between [`super::ReadThroughCache`] and the
//! actual store. [`MemoryCache`] keeps entries in a `HashMap` behind a
//! [`tokio::sync::RwLock`] and expires them lazily on access.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Cache-layer failure. Always absorbed by [`super::ReadThroughCache`].
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backend could not be reached.
    #[error("cache backend unreachable: {0}")]
    Unreachable(String),
    /// The operation did not complete in time.
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),
    /// A cached value could not be (de)serialized.
    #[error("cache codec error: {0}")]
    Codec(String),
}

/// Key/value store with per-entry TTL.
#[async_trait]
pub trait CacheBackend: Send + Sync + fmt::Debug {
    /// Returns the serialized value under `key`, if present and not expired.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend cannot be queried.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value` under `key` for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend cannot be written.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Whether a live entry exists under `key`. The read path uses
    /// [`CacheBackend::get`]; this is for inspecting a backend directly.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend cannot be queried.
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Removes every key in `keys`, returning how many existed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend cannot be written.
    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError>;

    /// Removes every key matching `pattern` (`*` matches any run of
    /// characters), returning how many existed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend cannot be written.
    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError>;

    /// Connectivity check.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend is unreachable.
    async fn ping(&self) -> Result<(), CacheError>;
}

/// Longest TTL [`MemoryCache`] honours; longer ones are clamped.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process cache backend.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until touched.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if no entries are stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        {
            let map = self.entries.read().await;
            match map.get(key) {
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        let mut map = self.entries.write().await;
        if map.get(key).is_some_and(|e| e.expires_at <= now) {
            map.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let entry = Entry {
            value,
            expires_at: now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .is_some_and(|e| e.expires_at > now))
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
        let mut map = self.entries.write().await;
        let removed = keys.iter().filter(|k| map.remove(k.as_str()).is_some()).count();
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut map = self.entries.write().await;
        let before = map.len();
        map.retain(|key, _| !glob_match(pattern, key));
        Ok(u64::try_from(before - map.len()).unwrap_or(u64::MAX))
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Matches `text` against `pattern`, where `*` matches any (possibly empty)
/// run of characters and every other character matches itself.
#[must_use]
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(head) = parts.next() else {
        return text.is_empty();
    };
    let Some(mut rest) = text.strip_prefix(head) else {
        return false;
    };
    let tail: Vec<&str> = parts.collect();
    let Some((last, middle)) = tail.split_last() else {
        // No `*` at all: exact match.
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(at) => rest = rest.get(at + part.len()..).unwrap_or_default(),
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}
