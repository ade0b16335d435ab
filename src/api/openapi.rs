//! OpenAPI document for every REST endpoint.

use utoipa::OpenApi;

use super::dto::{CreatePoolRequest, JoinPoolRequest};
use super::handlers::{history, matches, participant, pool, system};
use crate::domain::{
    FieldType, HistoryEntry, MatchResult, MatchStatus, PairView, ParticipantSearchHit,
    ParticipantView, PoolField, PoolStatus, PoolView,
};
use crate::error::{ErrorBody, ErrorResponse};
use crate::service::Statistics;

/// Generated OpenAPI specification, served by Swagger UI when the
/// `swagger-ui` feature is enabled.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "pairpool", description = "Participant pools with randomized pairing"),
    paths(
        pool::create_pool,
        pool::list_pools,
        pool::get_pool,
        pool::delete_pool,
        participant::join_pool,
        participant::list_participants,
        participant::search_participants,
        participant::remove_participant,
        matches::start_match,
        history::list_history,
        history::get_history,
        history::get_history_for_participant,
        history::statistics,
        system::health_handler,
    ),
    components(schemas(
        CreatePoolRequest,
        JoinPoolRequest,
        PoolView,
        PoolField,
        FieldType,
        PoolStatus,
        ParticipantView,
        ParticipantSearchHit,
        MatchResult,
        PairView,
        HistoryEntry,
        MatchStatus,
        Statistics,
        system::HealthResponse,
        ErrorResponse,
        ErrorBody,
    )),
    tags(
        (name = "Pools", description = "Pool lifecycle"),
        (name = "Participants", description = "Registration and removal"),
        (name = "Matching", description = "Random pairing"),
        (name = "History", description = "Match records and statistics"),
        (name = "System", description = "Health"),
    )
)]
pub struct ApiDoc;
