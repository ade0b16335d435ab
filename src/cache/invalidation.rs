//! Which cache keys each mutation makes stale.
//!
//! | Mutation           | Keys purged                                          |
//! |--------------------|------------------------------------------------------|
//! | create pool        | pool list                                            |
//! | join pool          | pool list, pool, pool participants                   |
//! | remove participant | pool list, owning pool, pool participants, stats     |
//! | start match        | pool list, history list, pool                        |
//! | delete pool        | pool list, stats, every `pool:{id}*` key             |
//!
//! Keys of unrelated pools are never touched.

use super::keys::CacheKey;
use crate::domain::PoolId;

/// A write that changes cached derived state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// A pool was created.
    CreatePool,
    /// A participant joined `pool_id`.
    JoinPool {
        /// Pool joined.
        pool_id: PoolId,
    },
    /// A participant of `pool_id` was removed.
    RemoveParticipant {
        /// Owning pool.
        pool_id: PoolId,
    },
    /// A match was committed for `pool_id`.
    StartMatch {
        /// Pool matched.
        pool_id: PoolId,
    },
    /// `pool_id` and its participants were deleted.
    DeletePool {
        /// Pool deleted.
        pool_id: PoolId,
    },
}

impl Mutation {
    /// The exact set of keys to purge after this mutation commits.
    #[must_use]
    pub fn stale_keys(&self) -> Vec<CacheKey> {
        match *self {
            Self::CreatePool => vec![CacheKey::PoolList],
            Self::JoinPool { pool_id } => vec![
                CacheKey::PoolList,
                CacheKey::Pool(pool_id),
                CacheKey::PoolParticipants(pool_id),
            ],
            Self::RemoveParticipant { pool_id } => vec![
                CacheKey::PoolList,
                CacheKey::Pool(pool_id),
                CacheKey::PoolParticipants(pool_id),
                CacheKey::Stats,
            ],
            Self::DeletePool { .. } => vec![CacheKey::PoolList, CacheKey::Stats],
            Self::StartMatch { pool_id } => vec![
                CacheKey::PoolList,
                CacheKey::HistoryList,
                CacheKey::Pool(pool_id),
            ],
        }
    }

    /// Key patterns to purge on top of [`Mutation::stale_keys`]. A deleted
    /// pool takes every key scoped to it.
    #[must_use]
    pub fn stale_patterns(&self) -> Vec<String> {
        match *self {
            Self::DeletePool { pool_id } => vec![CacheKey::pool_scope(pool_id)],
            _ => Vec::new(),
        }
    }
}
