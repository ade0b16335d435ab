//! Service layer: business logic orchestration.
//!
//! [`PoolService`] owns the pool lifecycle and matching; [`HistoryService`]
//! serves the immutable match history. Both talk to a
//! [`crate::persistence::PoolStore`] and read through a shared
//! [`crate::cache::ReadThroughCache`].

pub mod history_service;
pub mod pool_service;

pub use history_service::{HistoryService, Statistics};
pub use pool_service::{DEFAULT_COOLDOWN_SECS, PoolService};
