//! Persistence layer: the durable store behind the service.
//!
//! [`PoolStore`] is the seam the service layer talks to. Two
//! implementations are provided: [`PostgresStore`] on `sqlx::PgPool`, and
//! [`MemoryStore`] for tests and for running without a database.
//!
//! Writes that must land together are single trait calls, each one unit of
//! work in the implementation: pool + field schema in
//! [`PoolStore::insert_pool`], and match record + pairs + pool status in
//! [`PoolStore::commit_match`].

pub mod memory;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{MatchRecord, MatchRecordId, Participant, ParticipantId, Pool, PoolId};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Durable store failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A write precondition no longer held; another writer got there first.
    #[error("{0}")]
    Conflict(String),
    /// The backend failed; nothing was written.
    #[error("{0}")]
    Backend(String),
}

/// Everything written by one successful match.
#[derive(Debug, Clone)]
pub struct MatchCommit {
    /// Record with its pairs. `record.matched_at` becomes the pool's new
    /// `last_matched_at`.
    pub record: MatchRecord,
    /// `last_matched_at` as read before matching. The commit only applies if
    /// the stored value is still equal to it.
    pub expected_last_matched_at: Option<DateTime<Utc>>,
    /// Participants the pairs were drawn from. The commit only applies if
    /// the pool still holds exactly these participants.
    pub roster: Vec<ParticipantId>,
}

/// Row counts used for statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreCounts {
    /// Number of pools.
    pub pools: u64,
    /// Number of participants across all pools.
    pub participants: u64,
    /// Number of match records.
    pub matches: u64,
    /// Number of pairs across all records.
    pub pairs: u64,
}

/// Order-insensitive equality of two participant id lists.
pub(crate) fn same_roster(current: &mut [ParticipantId], expected: &[ParticipantId]) -> bool {
    if current.len() != expected.len() {
        return false;
    }
    let mut expected = expected.to_vec();
    current.sort_unstable();
    expected.sort_unstable();
    *current == *expected
}

/// Durable storage for pools, participants and match history.
#[async_trait]
pub trait PoolStore: Send + Sync + fmt::Debug {
    /// Persists `pool` and its field schema atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on failure; nothing is written.
    async fn insert_pool(&self, pool: &Pool) -> Result<(), StoreError>;

    /// Loads one pool with its field schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on failure.
    async fn get_pool(&self, id: PoolId) -> Result<Option<Pool>, StoreError>;

    /// Loads every pool, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on failure.
    async fn list_pools(&self) -> Result<Vec<Pool>, StoreError>;

    /// Deletes a pool and, by cascade, its participants. Match records are
    /// kept. Returns whether the pool existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on failure.
    async fn delete_pool(&self, id: PoolId) -> Result<bool, StoreError>;

    /// Number of participants in `pool_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on failure.
    async fn count_participants(&self, pool_id: PoolId) -> Result<u64, StoreError>;

    /// Persists a participant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on failure, including when the owning
    /// pool no longer exists.
    async fn insert_participant(&self, participant: &Participant) -> Result<(), StoreError>;

    /// Loads one participant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on failure.
    async fn get_participant(&self, id: ParticipantId) -> Result<Option<Participant>, StoreError>;

    /// Loads the participants of `pool_id`, in join order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on failure.
    async fn list_participants(&self, pool_id: PoolId) -> Result<Vec<Participant>, StoreError>;

    /// Participants whose contact token contains `fragment`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on failure.
    async fn search_participants(&self, fragment: &str) -> Result<Vec<Participant>, StoreError>;

    /// Deletes one participant. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on failure.
    async fn delete_participant(&self, id: ParticipantId) -> Result<bool, StoreError>;

    /// Flips a stored `matched` pool back to `active` if its
    /// `last_matched_at` still equals `expected_last_matched_at`. Returns
    /// whether the row changed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on failure.
    async fn reset_status(
        &self,
        pool_id: PoolId,
        expected_last_matched_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError>;

    /// Writes the match record, its pairs, and the pool's `matched` status
    /// as one unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the pool's `last_matched_at` or
    /// its participants changed since they were read, or
    /// [`StoreError::Backend`] on failure. In both cases nothing is written.
    async fn commit_match(&self, commit: &MatchCommit) -> Result<(), StoreError>;

    /// Match records without pairs, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on failure.
    async fn list_match_records(&self) -> Result<Vec<MatchRecord>, StoreError>;

    /// One match record with its pairs ordered by pair number.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on failure.
    async fn get_match_record(&self, id: MatchRecordId) -> Result<Option<MatchRecord>, StoreError>;

    /// Row counts for statistics.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on failure.
    async fn counts(&self) -> Result<StoreCounts, StoreError>;
}
