//! Match handler.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::domain::{MatchResult, PoolId};
use crate::error::{ErrorResponse, PoolError};

/// `POST /pools/{id}/match`: Pair the pool's participants at random.
///
/// # Errors
///
/// Returns [`PoolError::PoolNotFound`], [`PoolError::PoolExpired`],
/// [`PoolError::CoolingDown`], [`PoolError::InsufficientParticipants`] or
/// [`PoolError::Conflict`].
#[utoipa::path(
    post,
    path = "/api/v1/pools/{id}/match",
    tag = "Matching",
    summary = "Start a match",
    description = "Shuffles the pool's participants and pairs them in order. An odd participant count leaves one lone pair.",
    params(
        ("id" = uuid::Uuid, Path, description = "Pool UUID"),
    ),
    responses(
        (status = 200, description = "Match committed", body = MatchResult),
        (status = 404, description = "Pool not found", body = ErrorResponse),
        (status = 409, description = "Another match committed first", body = ErrorResponse),
        (
            status = 422,
            description = "Expired, cooling down, or fewer than two participants",
            body = ErrorResponse
        ),
    )
)]
pub async fn start_match(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, PoolError> {
    Ok(Json(
        state.pool_service.start_match(PoolId::from_uuid(id)).await?,
    ))
}

/// Matching routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/pools/{id}/match", post(start_match))
}
