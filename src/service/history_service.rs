//! History service: match records and global statistics.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::cache::{CacheKey, CacheTtl, ReadThroughCache};
use crate::domain::{Clock, DisplayNames, HistoryEntry, MatchRecord, MatchRecordId, MatchResult};
use crate::error::PoolError;
use crate::persistence::PoolStore;

/// Global totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Statistics {
    /// Number of pools.
    pub total_pools: u64,
    /// Number of participants across all pools.
    pub total_participants: u64,
    /// Number of match records.
    pub total_matches: u64,
    /// Number of pairs across all match records.
    pub total_pairs: u64,
    /// When these totals were computed.
    pub updated_at: DateTime<Utc>,
}

/// Read-only access to match history. Records are immutable, so detail
/// entries are cached on the long tier.
#[derive(Debug, Clone)]
pub struct HistoryService {
    store: Arc<dyn PoolStore>,
    cache: ReadThroughCache,
    clock: Arc<dyn Clock>,
    names: DisplayNames,
}

impl HistoryService {
    /// Creates a new `HistoryService`.
    #[must_use]
    pub fn new(store: Arc<dyn PoolStore>, cache: ReadThroughCache, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            cache,
            clock,
            names: DisplayNames::default(),
        }
    }

    /// Replaces the display-name candidate keys.
    #[must_use]
    pub fn with_display_names(mut self, names: DisplayNames) -> Self {
        self.names = names;
        self
    }

    /// Lists match records, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Unavailable`] if the store read fails.
    pub async fn list_history(&self) -> Result<Vec<HistoryEntry>, PoolError> {
        self.cache
            .get_or_load(CacheKey::HistoryList, CacheTtl::Medium, || async {
                let records = self.store.list_match_records().await?;
                Ok::<_, PoolError>(records.iter().map(HistoryEntry::from).collect())
            })
            .await
    }

    /// Returns one match record with every pair and display names.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::RecordNotFound`] if the record does not exist.
    pub async fn get_history(&self, record_id: MatchRecordId) -> Result<MatchResult, PoolError> {
        let record = self.load_record(record_id).await?;
        Ok(MatchResult::from_record(&record, &self.names))
    }

    /// Returns only the pairs involving `display_name`, with each
    /// counterpart hidden.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidInput`] for a blank name or
    /// [`PoolError::RecordNotFound`].
    pub async fn get_history_for_participant(
        &self,
        record_id: MatchRecordId,
        display_name: &str,
    ) -> Result<MatchResult, PoolError> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(PoolError::InvalidInput("participant name must not be empty".to_string()));
        }
        Ok(self.get_history(record_id).await?.anonymised_for(display_name))
    }

    /// Returns global totals.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Unavailable`] if the store read fails.
    pub async fn statistics(&self) -> Result<Statistics, PoolError> {
        self.cache
            .get_or_load(CacheKey::Stats, CacheTtl::Long, || async {
                let counts = self.store.counts().await?;
                Ok::<_, PoolError>(Statistics {
                    total_pools: counts.pools,
                    total_participants: counts.participants,
                    total_matches: counts.matches,
                    total_pairs: counts.pairs,
                    updated_at: self.clock.now(),
                })
            })
            .await
    }

    async fn load_record(&self, record_id: MatchRecordId) -> Result<MatchRecord, PoolError> {
        self.cache
            .get_or_load(CacheKey::History(record_id), CacheTtl::Long, || async {
                self.store
                    .get_match_record(record_id)
                    .await?
                    .ok_or(PoolError::RecordNotFound(record_id))
            })
            .await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;
    use serde_json::{Value, json};

    use super::*;
    use crate::cache::{CacheBackend, MemoryCache, TtlPolicy};
    use crate::domain::match_record::HIDDEN_COUNTERPART;
    use crate::domain::{
        ManualClock, MatchPair, NewPool, PairMember, ParticipantId, Pool, ProfileData,
    };
    use crate::persistence::{MatchCommit, MemoryStore};

    fn data(name: &str) -> ProfileData {
        let Value::Object(map) = json!({ "name": name }) else {
            panic!("expected object");
        };
        map
    }

    fn member(name: &str) -> PairMember {
        PairMember {
            participant_id: ParticipantId::new(),
            data: data(name),
        }
    }

    async fn seeded() -> (HistoryService, Arc<MemoryStore>, MatchRecordId) {
        let Some(start) = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).single() else {
            panic!("valid timestamp");
        };
        let clock = Arc::new(ManualClock::new(start));
        let store = Arc::new(MemoryStore::new());

        let Ok(pool) = Pool::create(
            NewPool {
                name: "Mentors".to_string(),
                description: String::new(),
                valid_until: start + chrono::Duration::days(1),
                cooldown_secs: None,
                fields: Vec::new(),
            },
            start,
            5,
        ) else {
            panic!("valid pool");
        };
        let _ = store.insert_pool(&pool).await;
        let record = MatchRecord::completed(
            pool.id,
            pool.name.clone(),
            vec![
                MatchPair {
                    pair_number: 1,
                    first: member("Ann"),
                    second: Some(member("Ben")),
                },
                MatchPair {
                    pair_number: 2,
                    first: member("Cal"),
                    second: None,
                },
            ],
            start,
        );
        let id = record.id;
        let Ok(()) = store
            .commit_match(&MatchCommit {
                record,
                expected_last_matched_at: None,
                roster: Vec::new(),
            })
            .await
        else {
            panic!("commit failed");
        };

        let cache = ReadThroughCache::new(
            Arc::new(MemoryCache::new()) as Arc<dyn CacheBackend>,
            TtlPolicy::default(),
            Duration::from_millis(250),
        );
        let service = HistoryService::new(
            Arc::clone(&store) as Arc<dyn PoolStore>,
            cache,
            clock as Arc<dyn Clock>,
        );
        (service, store, id)
    }

    #[tokio::test]
    async fn lists_and_resolves_history() {
        let (service, _, id) = seeded().await;
        let Ok(entries) = service.list_history().await else {
            panic!("list failed");
        };
        let [entry] = entries.as_slice() else {
            panic!("expected one entry");
        };
        assert_eq!(entry.pair_count, 2);
        assert!(entry.has_lone);

        let Ok(result) = service.get_history(id).await else {
            panic!("get failed");
        };
        assert_eq!(result.pool_name, "Mentors");
        assert_eq!(result.pairs.len(), 2);
    }

    #[tokio::test]
    async fn participant_view_hides_counterpart() {
        let (service, _, id) = seeded().await;
        let Ok(result) = service.get_history_for_participant(id, "Ann").await else {
            panic!("get failed");
        };
        let [pair] = result.pairs.as_slice() else {
            panic!("expected one pair");
        };
        assert_eq!(pair.first, "Ann");
        assert_eq!(pair.second.as_deref(), Some(HIDDEN_COUNTERPART));
        assert!(matches!(
            service.get_history_for_participant(id, " ").await,
            Err(PoolError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let (service, _, _) = seeded().await;
        assert!(matches!(
            service.get_history(MatchRecordId::new()).await,
            Err(PoolError::RecordNotFound(_))
        ));
    }

    #[tokio::test]
    async fn statistics_are_cached_on_the_long_tier() {
        let (service, store, _) = seeded().await;
        let Ok(first) = service.statistics().await else {
            panic!("stats failed");
        };
        assert_eq!(first.total_pools, 1);
        assert_eq!(first.total_pairs, 2);

        store.set_unavailable(true);
        let Ok(second) = service.statistics().await else {
            panic!("cached stats expected");
        };
        assert_eq!(first, second);
        assert!(service.list_history().await.is_err());
    }
}
