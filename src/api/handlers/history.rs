//! History and statistics handlers.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::ParticipantNameQuery;
use crate::app_state::AppState;
use crate::domain::{HistoryEntry, MatchRecordId, MatchResult};
use crate::error::{ErrorResponse, PoolError};
use crate::service::Statistics;

/// `GET /history`: List match records, newest first.
///
/// # Errors
///
/// Returns [`PoolError::Unavailable`] if the store cannot be read.
#[utoipa::path(
    get,
    path = "/api/v1/history",
    tag = "History",
    summary = "List match history",
    responses(
        (status = 200, description = "Match records", body = Vec<HistoryEntry>),
        (status = 503, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn list_history(State(state): State<AppState>) -> Result<impl IntoResponse, PoolError> {
    Ok(Json(state.history_service.list_history().await?))
}

/// `GET /history/{id}`: One match record with all pairs.
///
/// # Errors
///
/// Returns [`PoolError::RecordNotFound`] if the record does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/history/{id}",
    tag = "History",
    summary = "Get a match record",
    params(
        ("id" = uuid::Uuid, Path, description = "Match record UUID"),
    ),
    responses(
        (status = 200, description = "Match record", body = MatchResult),
        (status = 404, description = "Record not found", body = ErrorResponse),
    )
)]
pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, PoolError> {
    Ok(Json(
        state
            .history_service
            .get_history(MatchRecordId::from_uuid(id))
            .await?,
    ))
}

/// `GET /history/{id}/participant?name=`: One participant's pairs, with
/// the counterpart hidden.
///
/// # Errors
///
/// Returns [`PoolError::InvalidInput`] for a blank name or
/// [`PoolError::RecordNotFound`].
#[utoipa::path(
    get,
    path = "/api/v1/history/{id}/participant",
    tag = "History",
    summary = "Get a participant's view of a match",
    params(
        ("id" = uuid::Uuid, Path, description = "Match record UUID"),
        ParticipantNameQuery,
    ),
    responses(
        (status = 200, description = "Pairs involving the participant", body = MatchResult),
        (status = 400, description = "Blank name", body = ErrorResponse),
        (status = 404, description = "Record not found", body = ErrorResponse),
    )
)]
pub async fn get_history_for_participant(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Query(query): Query<ParticipantNameQuery>,
) -> Result<impl IntoResponse, PoolError> {
    Ok(Json(
        state
            .history_service
            .get_history_for_participant(MatchRecordId::from_uuid(id), &query.name)
            .await?,
    ))
}

/// `GET /stats`: Global totals.
///
/// # Errors
///
/// Returns [`PoolError::Unavailable`] if the store cannot be read.
#[utoipa::path(
    get,
    path = "/api/v1/stats",
    tag = "History",
    summary = "Get statistics",
    responses(
        (status = 200, description = "Totals", body = Statistics),
        (status = 503, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn statistics(State(state): State<AppState>) -> Result<impl IntoResponse, PoolError> {
    Ok(Json(state.history_service.statistics().await?))
}

/// History routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/history", get(list_history))
        .route("/history/{id}", get(get_history))
        .route(
            "/history/{id}/participant",
            get(get_history_for_participant),
        )
        .route("/stats", get(statistics))
}
