//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::{HistoryService, PoolService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Pool lifecycle, participants and matching.
    pub pool_service: Arc<PoolService>,
    /// Match history and statistics.
    pub history_service: Arc<HistoryService>,
}
