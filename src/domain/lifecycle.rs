//! Pool state machine.
//!
//! ```text
//!            create                 match
//!   (start) ───────▶ active ───────────────▶ matched
//!                      ▲                        │
//!                      └── cooldown elapsed ────┘   (observed lazily)
//!
//!   now > valid_until  ⇒  expired  (derived, overrides for display)
//! ```
//!
//! There is no background timer. Every function here is pure over the
//! stored pool and the caller-supplied `now`; listing, detail and match
//! eligibility all go through [`effective_status`] so they cannot drift.

use chrono::{DateTime, Utc};

use super::pool::{Pool, PoolStatus, StoredStatus};

/// Whether `pool` is past its expiry at `now`.
#[must_use]
pub fn is_expired(pool: &Pool, now: DateTime<Utc>) -> bool {
    now > pool.valid_until
}

/// Remaining cooldown for a stored `matched` pool, or `None` when the pool
/// is free to match again.
///
/// A `matched` pool without `last_matched_at` is legacy data and counts as
/// already cooled down.
#[must_use]
pub fn remaining_cooldown(pool: &Pool, now: DateTime<Utc>) -> Option<chrono::Duration> {
    if pool.status != StoredStatus::Matched {
        return None;
    }
    let last = pool.last_matched_at?;
    let elapsed = now - last;
    let cooldown = pool.cooldown();
    (elapsed < cooldown).then(|| cooldown - elapsed)
}

/// Effective status of `pool` at `now`.
///
/// 1. past `valid_until` → `expired`;
/// 2. stored `matched` → `matched` while the cooldown runs, else `active`;
/// 3. otherwise the stored status.
#[must_use]
pub fn effective_status(pool: &Pool, now: DateTime<Utc>) -> PoolStatus {
    if is_expired(pool, now) {
        return PoolStatus::Expired;
    }
    match pool.status {
        StoredStatus::Matched if remaining_cooldown(pool, now).is_some() => PoolStatus::Matched,
        StoredStatus::Matched | StoredStatus::Active => PoolStatus::Active,
    }
}

/// Outcome of checking whether a match may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEligibility {
    /// Stored status is `active`.
    Ready,
    /// Stored status is `matched` but the cooldown is over (or the pool is
    /// legacy data); the stored flag should be healed back to `active`.
    ReadyAfterReset,
    /// The cooldown is still running.
    CoolingDown {
        /// Time left until the pool may match again.
        remaining: chrono::Duration,
    },
    /// The pool is past its expiry.
    Expired,
}

/// Decides whether `pool` may be matched at `now`.
#[must_use]
pub fn match_eligibility(pool: &Pool, now: DateTime<Utc>) -> MatchEligibility {
    if is_expired(pool, now) {
        return MatchEligibility::Expired;
    }
    match pool.status {
        StoredStatus::Active => MatchEligibility::Ready,
        StoredStatus::Matched => match remaining_cooldown(pool, now) {
            Some(remaining) => MatchEligibility::CoolingDown { remaining },
            None => MatchEligibility::ReadyAfterReset,
        },
    }
}

/// Whether participants may be removed from `pool`.
///
/// Checks the stored flag, not the effective status: once matched, removal
/// stays blocked for the rest of the cycle even after the cooldown.
#[must_use]
pub fn removal_allowed(pool: &Pool) -> bool {
    pool.status != StoredStatus::Matched
}
