//! Shared fixtures for the integration tests.

#![allow(dead_code, clippy::panic)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};
use tokio::sync::Notify;

use pairpool::app_state::AppState;
use pairpool::cache::{CacheBackend, MemoryCache, ReadThroughCache, TtlPolicy};
use pairpool::domain::{
    Clock, FieldType, ManualClock, MatchRecord, MatchRecordId, NewPool, Participant,
    ParticipantId, Pool, PoolField, PoolId, ProfileData,
};
use pairpool::matching::{EntropySource, MatchingEngine, Shuffler};
use pairpool::persistence::{MatchCommit, MemoryStore, PoolStore, StoreCounts, StoreError};
use pairpool::service::{HistoryService, PoolService};

/// Fully wired services over in-memory collaborators and a manual clock.
pub struct Harness {
    pub pools: Arc<PoolService>,
    pub history: Arc<HistoryService>,
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryCache>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_entropy(EntropySource::local())
    }

    pub fn with_entropy(entropy: EntropySource) -> Self {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let read_through = ReadThroughCache::new(
            Arc::clone(&cache) as Arc<dyn CacheBackend>,
            TtlPolicy::default(),
            Duration::from_millis(250),
        );
        let shared = Arc::clone(&store) as Arc<dyn PoolStore>;
        Self::assemble(store, shared, cache, clock, read_through, entropy)
    }

    /// Services whose participant reads can be held open on `gate`.
    pub fn gated() -> (Self, Arc<Gate>) {
        let store = Arc::new(MemoryStore::new());
        let gate = Arc::new(Gate::default());
        let gated = GatedStore {
            inner: Arc::clone(&store),
            gate: Arc::clone(&gate),
        };
        let cache = Arc::new(MemoryCache::new());
        let read_through = ReadThroughCache::new(
            Arc::clone(&cache) as Arc<dyn CacheBackend>,
            TtlPolicy::default(),
            Duration::from_millis(250),
        );
        let clock = Arc::new(ManualClock::new(t0()));
        let harness = Self::assemble(
            store,
            Arc::new(gated),
            cache,
            clock,
            read_through,
            EntropySource::local(),
        );
        (harness, gate)
    }

    /// Same store and clock, no cache: every read hits the store.
    pub fn uncached_view(&self) -> PoolService {
        PoolService::new(
            Arc::clone(&self.store) as Arc<dyn PoolStore>,
            ReadThroughCache::disabled(),
            engine(EntropySource::local()),
            Arc::clone(&self.clock) as Arc<dyn Clock>,
        )
    }

    pub fn with_cache_backend(backend: Arc<dyn CacheBackend>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let read_through =
            ReadThroughCache::new(backend, TtlPolicy::default(), Duration::from_millis(50));
        let shared = Arc::clone(&store) as Arc<dyn PoolStore>;
        Self::assemble(
            store,
            shared,
            Arc::new(MemoryCache::new()),
            clock,
            read_through,
            EntropySource::local(),
        )
    }

    fn assemble(
        store: Arc<MemoryStore>,
        shared: Arc<dyn PoolStore>,
        cache: Arc<MemoryCache>,
        clock: Arc<ManualClock>,
        read_through: ReadThroughCache,
        entropy: EntropySource,
    ) -> Self {
        let pools = PoolService::new(
            Arc::clone(&shared),
            read_through.clone(),
            engine(entropy),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        let history = HistoryService::new(
            shared,
            read_through,
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        Self {
            pools: Arc::new(pools),
            history: Arc::new(history),
            store,
            cache,
            clock,
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            pool_service: Arc::clone(&self.pools),
            history_service: Arc::clone(&self.history),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn advance_secs(&self, secs: i64) {
        self.clock.advance(chrono::Duration::seconds(secs));
    }

    /// Creates a pool with a required `name` field and joins `names`.
    pub async fn pool_with(&self, names: &[&str]) -> PoolId {
        let Ok(view) = self.pools.create_pool(new_pool(self.clock.now())).await else {
            panic!("pool creation failed");
        };
        for name in names {
            let Ok(_) = self.pools.join_pool(view.id, profile(name), None).await else {
                panic!("join failed for {name}");
            };
        }
        view.id
    }
}

pub fn engine(entropy: EntropySource) -> MatchingEngine {
    MatchingEngine::new(Shuffler::new(Arc::new(entropy)))
}

pub fn t0() -> DateTime<Utc> {
    let Some(t) = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).single() else {
        panic!("valid timestamp");
    };
    t
}

pub fn new_pool(now: DateTime<Utc>) -> NewPool {
    NewPool {
        name: "Coffee chats".to_string(),
        description: "Random coffee pairs".to_string(),
        valid_until: now + chrono::Duration::days(3),
        cooldown_secs: Some(5),
        fields: vec![PoolField {
            name: "name".to_string(),
            label: "Name".to_string(),
            field_type: FieldType::Text,
            required: true,
            order: 1,
        }],
    }
}

pub fn profile(name: &str) -> ProfileData {
    let Value::Object(map) = json!({ "name": name }) else {
        panic!("expected object");
    };
    map
}

/// One-shot pause point. Once armed, the next gated store read completes
/// against the store, signals `reached`, and waits for `release`.
#[derive(Debug, Default)]
pub struct Gate {
    armed: AtomicBool,
    pub reached: Notify,
    pub release: Notify,
}

impl Gate {
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    async fn pass(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.reached.notify_one();
            self.release.notified().await;
        }
    }
}

/// [`MemoryStore`] whose `count_participants` and `list_participants` stop
/// at a [`Gate`] after reading.
#[derive(Debug)]
pub struct GatedStore {
    inner: Arc<MemoryStore>,
    gate: Arc<Gate>,
}

#[async_trait]
impl PoolStore for GatedStore {
    async fn insert_pool(&self, pool: &Pool) -> Result<(), StoreError> {
        self.inner.insert_pool(pool).await
    }
    async fn get_pool(&self, id: PoolId) -> Result<Option<Pool>, StoreError> {
        self.inner.get_pool(id).await
    }
    async fn list_pools(&self) -> Result<Vec<Pool>, StoreError> {
        self.inner.list_pools().await
    }
    async fn delete_pool(&self, id: PoolId) -> Result<bool, StoreError> {
        self.inner.delete_pool(id).await
    }
    async fn count_participants(&self, pool_id: PoolId) -> Result<u64, StoreError> {
        let count = self.inner.count_participants(pool_id).await;
        self.gate.pass().await;
        count
    }
    async fn insert_participant(&self, participant: &Participant) -> Result<(), StoreError> {
        self.inner.insert_participant(participant).await
    }
    async fn get_participant(&self, id: ParticipantId) -> Result<Option<Participant>, StoreError> {
        self.inner.get_participant(id).await
    }
    async fn list_participants(&self, pool_id: PoolId) -> Result<Vec<Participant>, StoreError> {
        let participants = self.inner.list_participants(pool_id).await;
        self.gate.pass().await;
        participants
    }
    async fn search_participants(&self, fragment: &str) -> Result<Vec<Participant>, StoreError> {
        self.inner.search_participants(fragment).await
    }
    async fn delete_participant(&self, id: ParticipantId) -> Result<bool, StoreError> {
        self.inner.delete_participant(id).await
    }
    async fn reset_status(
        &self,
        pool_id: PoolId,
        expected_last_matched_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        self.inner.reset_status(pool_id, expected_last_matched_at).await
    }
    async fn commit_match(&self, commit: &MatchCommit) -> Result<(), StoreError> {
        self.inner.commit_match(commit).await
    }
    async fn list_match_records(&self) -> Result<Vec<MatchRecord>, StoreError> {
        self.inner.list_match_records().await
    }
    async fn get_match_record(&self, id: MatchRecordId) -> Result<Option<MatchRecord>, StoreError> {
        self.inner.get_match_record(id).await
    }
    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        self.inner.counts().await
    }
}
