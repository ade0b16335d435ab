//! Read-through cache that never fails its caller.
//!
//! On a hit the cached JSON is decoded and returned without running the
//! loader. On a miss, a decode failure, a timeout, an unreachable backend,
//! or no backend at all, the loader runs and its value is written back on a
//! best-effort basis. Cache errors are logged and swallowed; only loader
//! errors reach the caller.
//!
//! A value loaded before an invalidation must not land in the cache after
//! it. Every invalidation bumps a generation counter shared by all clones;
//! a write-back whose load started under an older generation is dropped,
//! and one that raced the bump is deleted again.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::backend::{CacheBackend, CacheError};
use super::invalidation::Mutation;
use super::keys::{CacheKey, CacheTtl, TtlPolicy};

/// Cache façade used by the service layer.
#[derive(Debug, Clone)]
pub struct ReadThroughCache {
    backend: Option<Arc<dyn CacheBackend>>,
    ttl: TtlPolicy,
    op_timeout: Duration,
    generation: Arc<AtomicU64>,
}

impl ReadThroughCache {
    /// Creates a cache over `backend`; every backend call is bounded by
    /// `op_timeout`.
    #[must_use]
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: TtlPolicy, op_timeout: Duration) -> Self {
        Self {
            backend: Some(backend),
            ttl,
            op_timeout,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Creates a cache with no backend: every read goes to the loader.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            backend: None,
            ttl: TtlPolicy::default(),
            op_timeout: Duration::ZERO,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether a backend is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Returns the cached value under `key`, or runs `loader` and caches its
    /// result for the `tier` TTL.
    ///
    /// # Errors
    ///
    /// Only errors produced by `loader` are returned.
    pub async fn get_or_load<T, E, F, Fut>(
        &self,
        key: CacheKey,
        tier: CacheTtl,
        loader: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(backend) = &self.backend else {
            return loader().await;
        };
        let key = key.to_string();

        match self.lookup::<T>(backend.as_ref(), &key).await {
            Ok(Some(value)) => {
                tracing::debug!(%key, "cache hit");
                return Ok(value);
            }
            Ok(None) => tracing::debug!(%key, "cache miss"),
            Err(err) => {
                tracing::warn!(%key, error = %err, "cache read failed, loading from store");
            }
        }

        let started = self.generation.load(Ordering::SeqCst);
        let value = loader().await?;

        if self.generation.load(Ordering::SeqCst) != started {
            tracing::debug!(%key, "invalidated during load, skipping write-back");
            return Ok(value);
        }
        let ttl = self.ttl.duration(tier);
        if let Err(err) = self.store(backend.as_ref(), &key, &value, ttl).await {
            tracing::warn!(%key, error = %err, "cache write-back failed");
        }
        if self.generation.load(Ordering::SeqCst) != started {
            // An invalidation landed between the check and the write.
            let stale = std::slice::from_ref(&key);
            if let Err(err) = self.bounded(backend.delete(stale)).await {
                tracing::warn!(%key, error = %err, "stale write-back not removed");
            }
        }
        Ok(value)
    }

    /// Removes `key`. A no-op without a backend.
    pub async fn invalidate(&self, key: CacheKey) {
        self.invalidate_all(&[key]).await;
    }

    /// Removes every key in `keys`. A no-op without a backend.
    pub async fn invalidate_all(&self, keys: &[CacheKey]) {
        let Some(backend) = &self.backend else {
            return;
        };
        if keys.is_empty() {
            return;
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        let keys: Vec<String> = keys.iter().map(ToString::to_string).collect();
        match self.bounded(backend.delete(&keys)).await {
            Ok(removed) => tracing::debug!(?keys, removed, "cache invalidated"),
            Err(err) => tracing::warn!(?keys, error = %err, "cache invalidation failed"),
        }
    }

    /// Removes every key matching `pattern`. A no-op without a backend.
    pub async fn invalidate_pattern(&self, pattern: &str) {
        let Some(backend) = &self.backend else {
            return;
        };
        self.generation.fetch_add(1, Ordering::SeqCst);
        match self.bounded(backend.delete_pattern(pattern)).await {
            Ok(removed) => tracing::debug!(pattern, removed, "cache pattern invalidated"),
            Err(err) => tracing::warn!(pattern, error = %err, "cache pattern invalidation failed"),
        }
    }

    /// Purges the keys and key patterns made stale by `mutation`.
    pub async fn apply(&self, mutation: Mutation) {
        self.invalidate_all(&mutation.stale_keys()).await;
        for pattern in mutation.stale_patterns() {
            self.invalidate_pattern(&pattern).await;
        }
    }

    /// Whether the backend answers within the operation timeout. `false`
    /// without a backend.
    pub async fn is_reachable(&self) -> bool {
        match &self.backend {
            Some(backend) => self.bounded(backend.ping()).await.is_ok(),
            None => false,
        }
    }

    async fn lookup<T: DeserializeOwned>(
        &self,
        backend: &dyn CacheBackend,
        key: &str,
    ) -> Result<Option<T>, CacheError> {
        let Some(raw) = self.bounded(backend.get(key)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| CacheError::Codec(e.to_string()))
    }

    async fn store<T: Serialize>(
        &self,
        backend: &dyn CacheBackend,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let raw = serde_json::to_string(value).map_err(|e| CacheError::Codec(e.to_string()))?;
        self.bounded(backend.set(key, raw, ttl)).await
    }

    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        tokio::time::timeout(self.op_timeout, op)
            .await
            .map_err(|_| CacheError::Timeout(self.op_timeout))?
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::cache::backend::MemoryCache;
    use crate::domain::PoolId;

    /// Backend whose every call fails as if the server were down.
    #[derive(Debug, Default)]
    pub(crate) struct DownCache;

    #[async_trait]
    impl CacheBackend for DownCache {
        async fn get(&self, _: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unreachable("connection refused".to_string()))
        }
        async fn set(&self, _: &str, _: String, _: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unreachable("connection refused".to_string()))
        }
        async fn exists(&self, _: &str) -> Result<bool, CacheError> {
            Err(CacheError::Unreachable("connection refused".to_string()))
        }
        async fn delete(&self, _: &[String]) -> Result<u64, CacheError> {
            Err(CacheError::Unreachable("connection refused".to_string()))
        }
        async fn delete_pattern(&self, _: &str) -> Result<u64, CacheError> {
            Err(CacheError::Unreachable("connection refused".to_string()))
        }
        async fn ping(&self) -> Result<(), CacheError> {
            Err(CacheError::Unreachable("connection refused".to_string()))
        }
    }

    fn memory_cache() -> (Arc<MemoryCache>, ReadThroughCache) {
        let backend = Arc::new(MemoryCache::new());
        let cache = ReadThroughCache::new(
            Arc::clone(&backend) as Arc<dyn CacheBackend>,
            TtlPolicy::default(),
            Duration::from_millis(250),
        );
        (backend, cache)
    }

    async fn load_counting(
        cache: &ReadThroughCache,
        key: CacheKey,
        calls: &AtomicUsize,
    ) -> Result<u32, String> {
        cache
            .get_or_load(key, CacheTtl::Medium, || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(42)
            })
            .await
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let (_, cache) = memory_cache();
        let calls = AtomicUsize::new(0);
        assert_eq!(load_counting(&cache, CacheKey::PoolList, &calls).await, Ok(42));
        assert_eq!(load_counting(&cache, CacheKey::PoolList, &calls).await, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidation_forces_reload() {
        let (backend, cache) = memory_cache();
        let calls = AtomicUsize::new(0);
        let id = PoolId::new();
        let _ = load_counting(&cache, CacheKey::Pool(id), &calls).await;
        cache.apply(Mutation::JoinPool { pool_id: id }).await;
        assert!(backend.is_empty().await);
        let _ = load_counting(&cache, CacheKey::Pool(id), &calls).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn load_overtaken_by_invalidation_is_not_written_back() {
        let (backend, cache) = memory_cache();
        let id = PoolId::new();
        let loading = Notify::new();
        let release = Notify::new();

        let reader = cache.get_or_load(CacheKey::Pool(id), CacheTtl::Medium, || async {
            loading.notify_one();
            release.notified().await;
            Ok::<_, String>(0)
        });
        let writer = async {
            loading.notified().await;
            cache.apply(Mutation::JoinPool { pool_id: id }).await;
            release.notify_one();
        };
        let (stale, ()) = tokio::join!(reader, writer);
        assert_eq!(stale, Ok(0));
        assert!(backend.is_empty().await);

        let calls = AtomicUsize::new(0);
        assert_eq!(load_counting(&cache, CacheKey::Pool(id), &calls).await, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(backend.exists(&CacheKey::Pool(id).to_string()).await, Ok(true)));
    }

    #[tokio::test]
    async fn clones_share_the_invalidation_generation() {
        let (backend, cache) = memory_cache();
        let other = cache.clone();
        let loading = Notify::new();
        let release = Notify::new();

        let reader = cache.get_or_load(CacheKey::Stats, CacheTtl::Long, || async {
            loading.notify_one();
            release.notified().await;
            Ok::<_, String>(7)
        });
        let writer = async {
            loading.notified().await;
            other.invalidate(CacheKey::Stats).await;
            release.notify_one();
        };
        let (value, ()) = tokio::join!(reader, writer);
        assert_eq!(value, Ok(7));
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn unbounded_ttl_tiers_still_cache() {
        let backend = Arc::new(MemoryCache::new());
        let cache = ReadThroughCache::new(
            Arc::clone(&backend) as Arc<dyn CacheBackend>,
            TtlPolicy::new(Duration::MAX, Duration::MAX, Duration::MAX),
            Duration::from_millis(250),
        );
        let calls = AtomicUsize::new(0);
        assert_eq!(load_counting(&cache, CacheKey::Stats, &calls).await, Ok(42));
        assert_eq!(load_counting(&cache, CacheKey::Stats, &calls).await, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn loader_errors_propagate_and_are_not_cached() {
        let (backend, cache) = memory_cache();
        let result: Result<u32, String> = cache
            .get_or_load(CacheKey::Stats, CacheTtl::Long, || async {
                Err("db down".to_string())
            })
            .await;
        assert_eq!(result, Err("db down".to_string()));
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn unreachable_backend_degrades_to_loader() {
        let cache = ReadThroughCache::new(
            Arc::new(DownCache),
            TtlPolicy::default(),
            Duration::from_millis(50),
        );
        let calls = AtomicUsize::new(0);
        assert_eq!(load_counting(&cache, CacheKey::PoolList, &calls).await, Ok(42));
        assert_eq!(load_counting(&cache, CacheKey::PoolList, &calls).await, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        cache.invalidate(CacheKey::PoolList).await;
        assert!(!cache.is_reachable().await);
    }

    #[tokio::test]
    async fn disabled_cache_always_loads() {
        let cache = ReadThroughCache::disabled();
        let calls = AtomicUsize::new(0);
        let _ = load_counting(&cache, CacheKey::HistoryList, &calls).await;
        let _ = load_counting(&cache, CacheKey::HistoryList, &calls).await;
        cache.invalidate_pattern("pool:*").await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!cache.is_enabled());
    }

    #[tokio::test]
    async fn undecodable_entry_is_treated_as_miss() {
        let (backend, cache) = memory_cache();
        let _ = backend
            .set("pools:all", "not json".to_string(), Duration::from_secs(60))
            .await;
        let calls = AtomicUsize::new(0);
        assert_eq!(load_counting(&cache, CacheKey::PoolList, &calls).await, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(backend.get("pools:all").await, Ok(Some(v)) if v == "42"));
    }
}
