//! Pool handlers: create, list, get, delete.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::CreatePoolRequest;
use crate::app_state::AppState;
use crate::domain::{PoolId, PoolView};
use crate::error::{ErrorResponse, PoolError};

/// `POST /pools`: Create a new pool.
///
/// # Errors
///
/// Returns [`PoolError::InvalidInput`] on a blank name or bad field schema.
#[utoipa::path(
    post,
    path = "/api/v1/pools",
    tag = "Pools",
    summary = "Create a pool",
    description = "Creates an active pool with an ordered profile schema. The cooldown defaults to the server setting when omitted.",
    request_body = CreatePoolRequest,
    responses(
        (status = 201, description = "Pool created", body = PoolView),
        (status = 400, description = "Invalid pool definition", body = ErrorResponse),
        (status = 503, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn create_pool(
    State(state): State<AppState>,
    Json(req): Json<CreatePoolRequest>,
) -> Result<impl IntoResponse, PoolError> {
    let view = state.pool_service.create_pool(req.into()).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /pools`: List every pool with its effective status.
///
/// # Errors
///
/// Returns [`PoolError::Unavailable`] if the store cannot be read.
#[utoipa::path(
    get,
    path = "/api/v1/pools",
    tag = "Pools",
    summary = "List pools",
    description = "Returns every pool, oldest first, with participant count and effective status.",
    responses(
        (status = 200, description = "Pool list", body = Vec<PoolView>),
        (status = 503, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn list_pools(State(state): State<AppState>) -> Result<impl IntoResponse, PoolError> {
    Ok(Json(state.pool_service.list_pools().await?))
}

/// `GET /pools/{id}`: Get one pool.
///
/// # Errors
///
/// Returns [`PoolError::PoolNotFound`] if the pool does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/pools/{id}",
    tag = "Pools",
    summary = "Get pool details",
    params(
        ("id" = uuid::Uuid, Path, description = "Pool UUID"),
    ),
    responses(
        (status = 200, description = "Pool details", body = PoolView),
        (status = 404, description = "Pool not found", body = ErrorResponse),
    )
)]
pub async fn get_pool(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, PoolError> {
    Ok(Json(state.pool_service.get_pool(PoolId::from_uuid(id)).await?))
}

/// `DELETE /pools/{id}`: Delete a pool and its participants.
///
/// # Errors
///
/// Returns [`PoolError::PoolNotFound`] if the pool does not exist.
#[utoipa::path(
    delete,
    path = "/api/v1/pools/{id}",
    tag = "Pools",
    summary = "Delete a pool",
    description = "Removes the pool and its participants. Match history is kept.",
    params(
        ("id" = uuid::Uuid, Path, description = "Pool UUID"),
    ),
    responses(
        (status = 204, description = "Pool deleted"),
        (status = 404, description = "Pool not found", body = ErrorResponse),
    )
)]
pub async fn delete_pool(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, PoolError> {
    state.pool_service.delete_pool(PoolId::from_uuid(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Pool management routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pools", post(create_pool).get(list_pools))
        .route("/pools/{id}", get(get_pool).delete(delete_pool))
}
