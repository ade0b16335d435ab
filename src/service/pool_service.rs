//! Pool service: pool lifecycle, participants and matching.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::{CacheKey, CacheTtl, Mutation, ReadThroughCache};
use crate::domain::lifecycle::{self, MatchEligibility};
use crate::domain::{
    Clock, DisplayNames, MatchPair, MatchRecord, MatchResult, NewPool, PairMember, Participant,
    ParticipantId, ParticipantSearchHit, ParticipantView, Pool, PoolId, PoolSnapshot, PoolView,
    ProfileData,
};
use crate::error::PoolError;
use crate::matching::{InsufficientParticipants, MatchingEngine};
use crate::persistence::{MatchCommit, PoolStore};

/// Default cooldown applied when a pool is created without one.
pub const DEFAULT_COOLDOWN_SECS: u32 = 5;

/// Orchestration layer for pool operations.
///
/// Every mutation follows the same pattern: read from the store, check the
/// lifecycle rules at `clock.now()`, write, purge the keys listed by
/// [`Mutation::stale_keys`], return. Reads go through [`ReadThroughCache`]
/// and fold the effective status in after the cache, never before.
#[derive(Debug, Clone)]
pub struct PoolService {
    store: Arc<dyn PoolStore>,
    cache: ReadThroughCache,
    engine: MatchingEngine,
    clock: Arc<dyn Clock>,
    names: DisplayNames,
    default_cooldown_secs: u32,
}

impl PoolService {
    /// Creates a new `PoolService`.
    #[must_use]
    pub fn new(
        store: Arc<dyn PoolStore>,
        cache: ReadThroughCache,
        engine: MatchingEngine,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            cache,
            engine,
            clock,
            names: DisplayNames::default(),
            default_cooldown_secs: DEFAULT_COOLDOWN_SECS,
        }
    }

    /// Replaces the display-name candidate keys.
    #[must_use]
    pub fn with_display_names(mut self, names: DisplayNames) -> Self {
        self.names = names;
        self
    }

    /// Replaces the cooldown applied to pools created without one.
    #[must_use]
    pub fn with_default_cooldown(mut self, secs: u32) -> Self {
        self.default_cooldown_secs = secs;
        self
    }

    /// Returns the cache façade, for health reporting.
    #[must_use]
    pub fn cache(&self) -> &ReadThroughCache {
        &self.cache
    }

    /// Creates a pool with its field schema.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidInput`] for a blank name or bad field
    /// schema, or [`PoolError::Unavailable`] if the store write fails.
    pub async fn create_pool(&self, spec: NewPool) -> Result<PoolView, PoolError> {
        let now = self.clock.now();
        let pool = Pool::create(spec, now, self.default_cooldown_secs)?;
        self.store.insert_pool(&pool).await?;
        self.cache.apply(Mutation::CreatePool).await;

        tracing::info!(
            pool_id = %pool.id,
            name = %pool.name,
            fields = pool.fields.len(),
            "pool created"
        );
        Ok(PoolView::at(
            PoolSnapshot {
                pool,
                participant_count: 0,
            },
            now,
        ))
    }

    /// Lists every pool, oldest first, with its effective status.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Unavailable`] if the store read fails.
    pub async fn list_pools(&self) -> Result<Vec<PoolView>, PoolError> {
        let snapshots = self
            .cache
            .get_or_load(CacheKey::PoolList, CacheTtl::Medium, || self.load_snapshots())
            .await?;
        let now = self.clock.now();
        Ok(snapshots
            .into_iter()
            .map(|snapshot| PoolView::at(snapshot, now))
            .collect())
    }

    /// Returns one pool with its effective status.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::PoolNotFound`] if the pool does not exist.
    pub async fn get_pool(&self, pool_id: PoolId) -> Result<PoolView, PoolError> {
        let snapshot = self
            .cache
            .get_or_load(CacheKey::Pool(pool_id), CacheTtl::Medium, || {
                self.load_snapshot(pool_id)
            })
            .await?;
        Ok(PoolView::at(snapshot, self.clock.now()))
    }

    /// Registers a participant in `pool_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::PoolNotFound`], [`PoolError::PoolExpired`], or
    /// [`PoolError::InvalidInput`] when a required field is missing.
    pub async fn join_pool(
        &self,
        pool_id: PoolId,
        data: ProfileData,
        contact: Option<String>,
    ) -> Result<ParticipantView, PoolError> {
        let pool = self.require_pool(pool_id).await?;
        let now = self.clock.now();
        if lifecycle::is_expired(&pool, now) {
            return Err(PoolError::PoolExpired(pool_id));
        }

        let participant = Participant::join(&pool, data, contact, now)?;
        self.store.insert_participant(&participant).await?;
        self.cache.apply(Mutation::JoinPool { pool_id }).await;

        tracing::info!(%pool_id, participant_id = %participant.id, "participant joined");
        Ok(ParticipantView::new(participant, &self.names))
    }

    /// Lists the participants of `pool_id` in join order.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::PoolNotFound`] if the pool does not exist.
    pub async fn list_participants(
        &self,
        pool_id: PoolId,
    ) -> Result<Vec<ParticipantView>, PoolError> {
        let participants = self
            .cache
            .get_or_load(CacheKey::PoolParticipants(pool_id), CacheTtl::Short, || async {
                self.require_pool(pool_id).await?;
                Ok::<_, PoolError>(self.store.list_participants(pool_id).await?)
            })
            .await?;
        Ok(participants
            .into_iter()
            .map(|p| ParticipantView::new(p, &self.names))
            .collect())
    }

    /// Pairs every participant of `pool_id` at random and records the
    /// result.
    ///
    /// A pool whose stored flag is still `matched` after its cooldown (or
    /// without a `last_matched_at`) is reset to `active` first.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::PoolNotFound`], [`PoolError::PoolExpired`],
    /// [`PoolError::CoolingDown`] with the remaining seconds,
    /// [`PoolError::InsufficientParticipants`], or [`PoolError::Conflict`]
    /// if another match committed first.
    pub async fn start_match(&self, pool_id: PoolId) -> Result<MatchResult, PoolError> {
        let pool = self.require_pool(pool_id).await?;

        match lifecycle::match_eligibility(&pool, self.clock.now()) {
            MatchEligibility::Ready => {}
            MatchEligibility::ReadyAfterReset => {
                if self.store.reset_status(pool_id, pool.last_matched_at).await? {
                    tracing::info!(
                        %pool_id,
                        last_matched_at = ?pool.last_matched_at,
                        "pool status reset to active"
                    );
                }
            }
            MatchEligibility::CoolingDown { remaining } => {
                return Err(PoolError::cooling_down(remaining));
            }
            MatchEligibility::Expired => return Err(PoolError::PoolExpired(pool_id)),
        }

        let participants = self.store.list_participants(pool_id).await?;
        let roster: Vec<ParticipantId> = participants.iter().map(|p| p.id).collect();
        let pairings = self
            .engine
            .pair(participants)
            .await
            .map_err(|InsufficientParticipants(count)| {
                PoolError::InsufficientParticipants { count }
            })?;

        let pairs = pairings
            .into_iter()
            .map(|p| MatchPair {
                pair_number: p.number,
                first: member(p.first),
                second: p.second.map(member),
            })
            .collect();
        let record = MatchRecord::completed(pool_id, pool.name, pairs, self.clock.now());

        self.store
            .commit_match(&MatchCommit {
                record: record.clone(),
                expected_last_matched_at: pool.last_matched_at,
                roster,
            })
            .await?;
        self.cache.apply(Mutation::StartMatch { pool_id }).await;

        tracing::info!(
            %pool_id,
            record_id = %record.id,
            participants = record.participant_count,
            pairs = record.pair_count,
            "match committed"
        );
        Ok(MatchResult::from_record(&record, &self.names))
    }

    /// Removes one participant.
    ///
    /// Blocked while the owning pool's stored flag is `matched`, whatever
    /// its cooldown says.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ParticipantNotFound`] or
    /// [`PoolError::PoolAlreadyMatched`].
    pub async fn remove_participant(&self, participant_id: ParticipantId) -> Result<(), PoolError> {
        let participant = self
            .store
            .get_participant(participant_id)
            .await?
            .ok_or(PoolError::ParticipantNotFound(participant_id))?;
        let pool_id = participant.pool_id;
        let pool = self
            .store
            .get_pool(pool_id)
            .await?
            .ok_or(PoolError::ParticipantNotFound(participant_id))?;

        if !lifecycle::removal_allowed(&pool) {
            return Err(PoolError::PoolAlreadyMatched(pool_id));
        }
        if !self.store.delete_participant(participant_id).await? {
            return Err(PoolError::ParticipantNotFound(participant_id));
        }
        self.cache.apply(Mutation::RemoveParticipant { pool_id }).await;

        tracing::info!(%pool_id, %participant_id, "participant removed");
        Ok(())
    }

    /// Finds participants whose contact token contains `fragment`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidInput`] for a blank fragment.
    pub async fn search_participants(
        &self,
        fragment: &str,
    ) -> Result<Vec<ParticipantSearchHit>, PoolError> {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return Err(PoolError::InvalidInput("contact must not be empty".to_string()));
        }

        let now = self.clock.now();
        let mut pools: HashMap<PoolId, Option<Pool>> = HashMap::new();
        let mut hits = Vec::new();
        for participant in self.store.search_participants(fragment).await? {
            let pool = match pools.get(&participant.pool_id) {
                Some(pool) => pool.clone(),
                None => {
                    let pool = self.store.get_pool(participant.pool_id).await?;
                    pools.insert(participant.pool_id, pool.clone());
                    pool
                }
            };
            // A pool deleted between the two reads takes its participants with it.
            if let Some(pool) = pool {
                hits.push(ParticipantSearchHit::new(participant, &pool, &self.names, now));
            }
        }
        Ok(hits)
    }

    /// Deletes a pool and its participants. Match history is kept.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::PoolNotFound`] if the pool does not exist.
    pub async fn delete_pool(&self, pool_id: PoolId) -> Result<(), PoolError> {
        if !self.store.delete_pool(pool_id).await? {
            return Err(PoolError::PoolNotFound(pool_id));
        }
        self.cache.apply(Mutation::DeletePool { pool_id }).await;

        tracing::info!(%pool_id, "pool deleted");
        Ok(())
    }

    async fn require_pool(&self, pool_id: PoolId) -> Result<Pool, PoolError> {
        self.store
            .get_pool(pool_id)
            .await?
            .ok_or(PoolError::PoolNotFound(pool_id))
    }

    async fn load_snapshot(&self, pool_id: PoolId) -> Result<PoolSnapshot, PoolError> {
        let pool = self.require_pool(pool_id).await?;
        let participant_count = self.store.count_participants(pool_id).await?;
        Ok(PoolSnapshot {
            pool,
            participant_count,
        })
    }

    async fn load_snapshots(&self) -> Result<Vec<PoolSnapshot>, PoolError> {
        let pools = self.store.list_pools().await?;
        let mut snapshots = Vec::with_capacity(pools.len());
        for pool in pools {
            let participant_count = self.store.count_participants(pool.id).await?;
            snapshots.push(PoolSnapshot {
                pool,
                participant_count,
            });
        }
        Ok(snapshots)
    }
}

fn member(participant: Participant) -> PairMember {
    PairMember {
        participant_id: participant.id,
        data: participant.data,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use serde_json::{Value, json};

    use super::*;
    use crate::cache::{CacheBackend, MemoryCache, TtlPolicy};
    use crate::domain::{FieldType, ManualClock, PoolField, PoolStatus, StoredStatus};
    use crate::error::ErrorKind;
    use crate::matching::{EntropySource, Shuffler};
    use crate::persistence::{MemoryStore, StoreError};

    struct Harness {
        service: PoolService,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let Some(start) = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).single() else {
            panic!("valid timestamp");
        };
        let clock = Arc::new(ManualClock::new(start));
        let cache = ReadThroughCache::new(
            Arc::new(MemoryCache::new()) as Arc<dyn CacheBackend>,
            TtlPolicy::default(),
            Duration::from_millis(250),
        );
        let engine = MatchingEngine::new(Shuffler::new(Arc::new(EntropySource::local())));
        let service = PoolService::new(
            Arc::clone(&store) as Arc<dyn PoolStore>,
            cache,
            engine,
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        Harness { service, store, clock }
    }

    fn spec(clock: &ManualClock) -> NewPool {
        NewPool {
            name: "Lunch roulette".to_string(),
            description: "Weekly lunch pairing".to_string(),
            valid_until: clock.now() + chrono::Duration::days(7),
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

    fn data(name: &str) -> ProfileData {
        let Value::Object(map) = json!({ "name": name }) else {
            panic!("expected object");
        };
        map
    }

    async fn pool_with(h: &Harness, names: &[&str]) -> PoolId {
        let Ok(view) = h.service.create_pool(spec(&h.clock)).await else {
            panic!("pool creation failed");
        };
        for name in names {
            let Ok(_) = h.service.join_pool(view.id, data(name), None).await else {
                panic!("join failed");
            };
        }
        view.id
    }

    #[tokio::test]
    async fn create_pool_starts_active_and_empty() {
        let h = harness();
        let Ok(view) = h.service.create_pool(spec(&h.clock)).await else {
            panic!("pool creation failed");
        };
        assert_eq!(view.status, PoolStatus::Active);
        assert_eq!(view.participant_count, 0);
        assert_eq!(view.cooldown_secs, 5);
    }

    #[tokio::test]
    async fn join_is_visible_through_cached_reads() {
        let h = harness();
        let id = pool_with(&h, &["Ann"]).await;
        let Ok(before) = h.service.get_pool(id).await else {
            panic!("get failed");
        };
        assert_eq!(before.participant_count, 1);

        let Ok(_) = h.service.join_pool(id, data("Ben"), None).await else {
            panic!("join failed");
        };
        let Ok(after) = h.service.get_pool(id).await else {
            panic!("get failed");
        };
        assert_eq!(after.participant_count, 2);
        let Ok(listed) = h.service.list_participants(id).await else {
            panic!("list failed");
        };
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn join_rejects_expired_pool_and_missing_fields() {
        let h = harness();
        let id = pool_with(&h, &[]).await;
        let missing = h.service.join_pool(id, ProfileData::new(), None).await;
        assert!(matches!(missing, Err(PoolError::InvalidInput(_))));

        h.clock.advance(chrono::Duration::days(8));
        let expired = h.service.join_pool(id, data("Ann"), None).await;
        assert!(matches!(expired, Err(PoolError::PoolExpired(_))));
    }

    #[tokio::test]
    async fn start_match_pairs_everyone_and_sets_cooldown() {
        let h = harness();
        let id = pool_with(&h, &["Ann", "Ben", "Cal"]).await;
        let Ok(result) = h.service.start_match(id).await else {
            panic!("match failed");
        };
        assert_eq!(result.participant_count, 3);
        assert_eq!(result.pairs.len(), 2);
        assert_eq!(result.pairs.iter().filter(|p| p.second.is_none()).count(), 1);

        let Ok(view) = h.service.get_pool(id).await else {
            panic!("get failed");
        };
        assert_eq!(view.status, PoolStatus::Matched);

        h.clock.advance(chrono::Duration::seconds(2));
        let Err(err) = h.service.start_match(id).await else {
            panic!("cooldown should block");
        };
        assert!(matches!(
            err,
            PoolError::CoolingDown { remaining_secs } if (remaining_secs - 3.0).abs() < f64::EPSILON
        ));
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    }

    #[tokio::test]
    async fn start_match_after_cooldown_heals_stored_status() {
        let h = harness();
        let id = pool_with(&h, &["Ann", "Ben"]).await;
        let Ok(_) = h.service.start_match(id).await else {
            panic!("match failed");
        };
        h.clock.advance(chrono::Duration::seconds(6));
        let Ok(view) = h.service.get_pool(id).await else {
            panic!("get failed");
        };
        assert_eq!(view.status, PoolStatus::Active);
        assert!(h.service.start_match(id).await.is_ok());
        assert!(matches!(h.store.counts().await, Ok(c) if c.matches == 2));
    }

    #[tokio::test]
    async fn start_match_needs_two_participants() {
        let h = harness();
        let id = pool_with(&h, &["Ann"]).await;
        let result = h.service.start_match(id).await;
        assert!(matches!(result, Err(PoolError::InsufficientParticipants { count: 1 })));
    }

    #[tokio::test]
    async fn removal_is_blocked_by_stored_matched_flag() {
        let h = harness();
        let id = pool_with(&h, &["Ann", "Ben"]).await;
        let Ok(listed) = h.service.list_participants(id).await else {
            panic!("list failed");
        };
        let Some(first) = listed.first() else {
            panic!("no participants");
        };
        let Ok(_) = h.service.start_match(id).await else {
            panic!("match failed");
        };

        h.clock.advance(chrono::Duration::hours(1));
        let Ok(pool) = h.store.get_pool(id).await else {
            panic!("store read failed");
        };
        assert!(matches!(pool, Some(p) if p.status == StoredStatus::Matched));
        let result = h.service.remove_participant(first.id).await;
        assert!(matches!(result, Err(PoolError::PoolAlreadyMatched(_))));
    }

    #[tokio::test]
    async fn remove_participant_updates_counts() {
        let h = harness();
        let id = pool_with(&h, &["Ann", "Ben"]).await;
        let Ok(listed) = h.service.list_participants(id).await else {
            panic!("list failed");
        };
        let Some(first) = listed.first() else {
            panic!("no participants");
        };
        assert!(h.service.remove_participant(first.id).await.is_ok());
        assert!(matches!(
            h.service.remove_participant(first.id).await,
            Err(PoolError::ParticipantNotFound(_))
        ));
        let Ok(view) = h.service.get_pool(id).await else {
            panic!("get failed");
        };
        assert_eq!(view.participant_count, 1);
        assert!(matches!(h.service.list_participants(id).await, Ok(l) if l.len() == 1));
    }

    #[tokio::test]
    async fn search_reports_pool_context() {
        let h = harness();
        let id = pool_with(&h, &[]).await;
        let Ok(_) = h
            .service
            .join_pool(id, data("Ann"), Some("ann@example.com".to_string()))
            .await
        else {
            panic!("join failed");
        };
        let Ok(hits) = h.service.search_participants("ann@").await else {
            panic!("search failed");
        };
        let [hit] = hits.as_slice() else {
            panic!("expected one hit");
        };
        assert_eq!(hit.display_name, "Ann");
        assert_eq!(hit.pool_name, "Lunch roulette");
        assert_eq!(hit.status, PoolStatus::Active);

        assert!(matches!(
            h.service.search_participants("  ").await,
            Err(PoolError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn delete_pool_keeps_history() {
        let h = harness();
        let id = pool_with(&h, &["Ann", "Ben"]).await;
        let Ok(_) = h.service.start_match(id).await else {
            panic!("match failed");
        };
        assert!(h.service.delete_pool(id).await.is_ok());
        assert!(matches!(h.service.get_pool(id).await, Err(PoolError::PoolNotFound(_))));
        assert!(matches!(h.service.delete_pool(id).await, Err(PoolError::PoolNotFound(_))));
        assert!(matches!(h.store.counts().await, Ok(c) if c.matches == 1 && c.participants == 0));
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_unavailable() {
        let h = harness();
        h.store.set_unavailable(true);
        let Err(err) = h.service.list_pools().await else {
            panic!("expected failure");
        };
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(matches!(
            PoolError::from(StoreError::Conflict("x".to_string())).kind(),
            ErrorKind::Conflict
        ));
    }
}
