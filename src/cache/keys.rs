//! Cache key layout and TTL tiers.

use std::fmt;
use std::time::Duration;

use crate::domain::{MatchRecordId, PoolId};

/// Every key the service reads through or invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// `pools:all`: listing of every pool.
    PoolList,
    /// `pool:{id}`: one pool's detail.
    Pool(PoolId),
    /// `pool:{id}:participants`: one pool's participant list.
    PoolParticipants(PoolId),
    /// `history:all`: match history listing.
    HistoryList,
    /// `history:{id}`: one match record with pairs.
    History(MatchRecordId),
    /// `stats:general`: global statistics.
    Stats,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PoolList => f.write_str("pools:all"),
            Self::Pool(id) => write!(f, "pool:{id}"),
            Self::PoolParticipants(id) => write!(f, "pool:{id}:participants"),
            Self::HistoryList => f.write_str("history:all"),
            Self::History(id) => write!(f, "history:{id}"),
            Self::Stats => f.write_str("stats:general"),
        }
    }
}

impl CacheKey {
    /// Pattern covering every key scoped to `pool_id`.
    #[must_use]
    pub fn pool_scope(pool_id: PoolId) -> String {
        format!("pool:{pool_id}*")
    }
}

/// Relative freshness class of a cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTtl {
    /// Frequently changing per-pool data (participant lists).
    Short,
    /// Pool listings and details.
    Medium,
    /// Completed, immutable history and statistics.
    Long,
}

/// Concrete durations for each [`CacheTtl`] tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    /// Duration of [`CacheTtl::Short`].
    pub short: Duration,
    /// Duration of [`CacheTtl::Medium`].
    pub medium: Duration,
    /// Duration of [`CacheTtl::Long`].
    pub long: Duration,
}

impl TtlPolicy {
    /// Builds a policy, raising tiers as needed so `short <= medium <= long`.
    #[must_use]
    pub fn new(short: Duration, medium: Duration, long: Duration) -> Self {
        let medium = medium.max(short);
        let long = long.max(medium);
        Self { short, medium, long }
    }

    /// Duration for `tier`.
    #[must_use]
    pub const fn duration(&self, tier: CacheTtl) -> Duration {
        match tier {
            CacheTtl::Short => self.short,
            CacheTtl::Medium => self.medium,
            CacheTtl::Long => self.long,
        }
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(5 * 60),
            Duration::from_secs(30 * 60),
            Duration::from_secs(2 * 60 * 60),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        let id = PoolId::new();
        assert_eq!(CacheKey::PoolList.to_string(), "pools:all");
        assert_eq!(CacheKey::Pool(id).to_string(), format!("pool:{id}"));
        assert_eq!(
            CacheKey::PoolParticipants(id).to_string(),
            format!("pool:{id}:participants")
        );
        assert_eq!(CacheKey::Stats.to_string(), "stats:general");
    }

    #[test]
    fn tiers_are_ordered() {
        let policy = TtlPolicy::new(
            Duration::from_secs(60),
            Duration::from_secs(10),
            Duration::from_secs(30),
        );
        assert!(policy.duration(CacheTtl::Short) <= policy.duration(CacheTtl::Medium));
        assert!(policy.duration(CacheTtl::Medium) <= policy.duration(CacheTtl::Long));
    }
}
