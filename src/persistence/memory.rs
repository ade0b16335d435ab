//! In-process store used by tests and when persistence is disabled.
//!
//! All tables sit behind one [`RwLock`], so every trait call observes and
//! produces a consistent state, just like a transaction would.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{MatchCommit, PoolStore, StoreCounts, StoreError, same_roster};
use crate::domain::{
    MatchRecord, MatchRecordId, Participant, ParticipantId, Pool, PoolId, StoredStatus,
};

#[derive(Debug, Default)]
struct Tables {
    pools: HashMap<PoolId, Pool>,
    participants: HashMap<ParticipantId, Participant>,
    records: HashMap<MatchRecordId, MatchRecord>,
}

/// [`PoolStore`] backed by `HashMap`s.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every call fails with [`StoreError::Backend`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("store unavailable".to_string()));
        }
        Ok(())
    }
}

fn to_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

#[async_trait]
impl PoolStore for MemoryStore {
    async fn insert_pool(&self, pool: &Pool) -> Result<(), StoreError> {
        self.check()?;
        self.tables.write().await.pools.insert(pool.id, pool.clone());
        Ok(())
    }

    async fn get_pool(&self, id: PoolId) -> Result<Option<Pool>, StoreError> {
        self.check()?;
        Ok(self.tables.read().await.pools.get(&id).cloned())
    }

    async fn list_pools(&self) -> Result<Vec<Pool>, StoreError> {
        self.check()?;
        let mut pools: Vec<Pool> = self.tables.read().await.pools.values().cloned().collect();
        pools.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.as_uuid().cmp(b.id.as_uuid()))
        });
        Ok(pools)
    }

    async fn delete_pool(&self, id: PoolId) -> Result<bool, StoreError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if tables.pools.remove(&id).is_none() {
            return Ok(false);
        }
        tables.participants.retain(|_, p| p.pool_id != id);
        Ok(true)
    }

    async fn count_participants(&self, pool_id: PoolId) -> Result<u64, StoreError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(to_u64(
            tables.participants.values().filter(|p| p.pool_id == pool_id).count(),
        ))
    }

    async fn insert_participant(&self, participant: &Participant) -> Result<(), StoreError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if !tables.pools.contains_key(&participant.pool_id) {
            return Err(StoreError::Backend(format!(
                "pool {} does not exist",
                participant.pool_id
            )));
        }
        tables.participants.insert(participant.id, participant.clone());
        Ok(())
    }

    async fn get_participant(&self, id: ParticipantId) -> Result<Option<Participant>, StoreError> {
        self.check()?;
        Ok(self.tables.read().await.participants.get(&id).cloned())
    }

    async fn list_participants(&self, pool_id: PoolId) -> Result<Vec<Participant>, StoreError> {
        self.check()?;
        let mut participants: Vec<Participant> = self
            .tables
            .read()
            .await
            .participants
            .values()
            .filter(|p| p.pool_id == pool_id)
            .cloned()
            .collect();
        participants.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.id.as_uuid().cmp(b.id.as_uuid()))
        });
        Ok(participants)
    }

    async fn search_participants(&self, fragment: &str) -> Result<Vec<Participant>, StoreError> {
        self.check()?;
        let mut found: Vec<Participant> = self
            .tables
            .read()
            .await
            .participants
            .values()
            .filter(|p| p.contact.as_deref().is_some_and(|c| c.contains(fragment)))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        Ok(found)
    }

    async fn delete_participant(&self, id: ParticipantId) -> Result<bool, StoreError> {
        self.check()?;
        Ok(self.tables.write().await.participants.remove(&id).is_some())
    }

    async fn reset_status(
        &self,
        pool_id: PoolId,
        expected_last_matched_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let Some(pool) = tables.pools.get_mut(&pool_id) else {
            return Ok(false);
        };
        if pool.status != StoredStatus::Matched
            || pool.last_matched_at != expected_last_matched_at
        {
            return Ok(false);
        }
        pool.status = StoredStatus::Active;
        Ok(true)
    }

    async fn commit_match(&self, commit: &MatchCommit) -> Result<(), StoreError> {
        self.check()?;
        let record = &commit.record;
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        let Some(pool) = tables.pools.get_mut(&record.pool_id) else {
            return Err(StoreError::Conflict(format!(
                "pool {} was deleted during matching",
                record.pool_id
            )));
        };
        if pool.last_matched_at != commit.expected_last_matched_at {
            return Err(StoreError::Conflict(format!(
                "pool {} was matched concurrently",
                record.pool_id
            )));
        }
        let mut current: Vec<ParticipantId> = tables
            .participants
            .values()
            .filter(|p| p.pool_id == record.pool_id)
            .map(|p| p.id)
            .collect();
        if !same_roster(&mut current, &commit.roster) {
            return Err(StoreError::Conflict(format!(
                "participants of pool {} changed while matching",
                record.pool_id
            )));
        }
        pool.status = StoredStatus::Matched;
        pool.last_matched_at = Some(record.matched_at);
        tables.records.insert(record.id, record.clone());
        Ok(())
    }

    async fn list_match_records(&self) -> Result<Vec<MatchRecord>, StoreError> {
        self.check()?;
        let mut records: Vec<MatchRecord> = self
            .tables
            .read()
            .await
            .records
            .values()
            .map(|r| MatchRecord {
                pairs: Vec::new(),
                ..r.clone()
            })
            .collect();
        records.sort_by(|a, b| b.matched_at.cmp(&a.matched_at));
        Ok(records)
    }

    async fn get_match_record(&self, id: MatchRecordId) -> Result<Option<MatchRecord>, StoreError> {
        self.check()?;
        Ok(self.tables.read().await.records.get(&id).cloned())
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(StoreCounts {
            pools: to_u64(tables.pools.len()),
            participants: to_u64(tables.participants.len()),
            matches: to_u64(tables.records.len()),
            pairs: tables.records.values().map(|r| u64::from(r.pair_count)).sum(),
        })
    }
}
