//! REST endpoint handlers organized by resource.

pub mod history;
pub mod matches;
pub mod participant;
pub mod pool;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(pool::routes())
        .merge(participant::routes())
        .merge(matches::routes())
        .merge(history::routes())
}
