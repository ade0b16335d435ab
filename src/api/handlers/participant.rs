//! Participant handlers: join, list, search, remove.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use axum::{Json, Router};

use crate::api::dto::{ContactQuery, JoinPoolRequest};
use crate::app_state::AppState;
use crate::domain::{ParticipantId, ParticipantSearchHit, ParticipantView, PoolId};
use crate::error::{ErrorResponse, PoolError};

/// `POST /pools/{id}/participants`: Join a pool.
///
/// # Errors
///
/// Returns [`PoolError::PoolNotFound`], [`PoolError::PoolExpired`] or
/// [`PoolError::InvalidInput`] when a required field is missing.
#[utoipa::path(
    post,
    path = "/api/v1/pools/{id}/participants",
    tag = "Participants",
    summary = "Join a pool",
    description = "Registers a participant. Every required field of the pool's schema must carry a non-empty value.",
    params(
        ("id" = uuid::Uuid, Path, description = "Pool UUID"),
    ),
    request_body = JoinPoolRequest,
    responses(
        (status = 201, description = "Participant registered", body = ParticipantView),
        (status = 400, description = "Missing required field", body = ErrorResponse),
        (status = 404, description = "Pool not found", body = ErrorResponse),
        (status = 422, description = "Pool expired", body = ErrorResponse),
    )
)]
pub async fn join_pool(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<JoinPoolRequest>,
) -> Result<impl IntoResponse, PoolError> {
    let view = state
        .pool_service
        .join_pool(PoolId::from_uuid(id), req.data, req.contact)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /pools/{id}/participants`: List a pool's participants.
///
/// # Errors
///
/// Returns [`PoolError::PoolNotFound`] if the pool does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/pools/{id}/participants",
    tag = "Participants",
    summary = "List participants",
    params(
        ("id" = uuid::Uuid, Path, description = "Pool UUID"),
    ),
    responses(
        (status = 200, description = "Participants in join order", body = Vec<ParticipantView>),
        (status = 404, description = "Pool not found", body = ErrorResponse),
    )
)]
pub async fn list_participants(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, PoolError> {
    Ok(Json(
        state
            .pool_service
            .list_participants(PoolId::from_uuid(id))
            .await?,
    ))
}

/// `GET /participants?contact=`: Find registrations by contact token.
///
/// # Errors
///
/// Returns [`PoolError::InvalidInput`] for a blank contact.
#[utoipa::path(
    get,
    path = "/api/v1/participants",
    tag = "Participants",
    summary = "Search participants by contact",
    params(ContactQuery),
    responses(
        (status = 200, description = "Matching registrations", body = Vec<ParticipantSearchHit>),
        (status = 400, description = "Blank contact", body = ErrorResponse),
    )
)]
pub async fn search_participants(
    State(state): State<AppState>,
    Query(query): Query<ContactQuery>,
) -> Result<impl IntoResponse, PoolError> {
    Ok(Json(
        state
            .pool_service
            .search_participants(&query.contact)
            .await?,
    ))
}

/// `DELETE /participants/{id}`: Remove a participant.
///
/// # Errors
///
/// Returns [`PoolError::ParticipantNotFound`] or
/// [`PoolError::PoolAlreadyMatched`].
#[utoipa::path(
    delete,
    path = "/api/v1/participants/{id}",
    tag = "Participants",
    summary = "Remove a participant",
    description = "Blocked once the owning pool has been matched.",
    params(
        ("id" = uuid::Uuid, Path, description = "Participant UUID"),
    ),
    responses(
        (status = 204, description = "Participant removed"),
        (status = 404, description = "Participant not found", body = ErrorResponse),
        (status = 422, description = "Pool already matched", body = ErrorResponse),
    )
)]
pub async fn remove_participant(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, PoolError> {
    state
        .pool_service
        .remove_participant(ParticipantId::from_uuid(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Participant routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/pools/{id}/participants",
            get(list_participants).post(join_pool),
        )
        .route("/participants", get(search_participants))
        .route("/participants/{id}", delete(remove_participant))
}
