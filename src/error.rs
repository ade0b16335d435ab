//! Service error types with HTTP status code mapping.
//!
//! [`PoolError`] is the central error type surfaced to callers. Each variant
//! belongs to exactly one [`ErrorKind`], maps to a numeric error code and an
//! HTTP status, and renders as a structured JSON error response.
//!
//! Degraded dependencies (cache backend, remote entropy) never appear here:
//! they are absorbed inside [`crate::cache`] and [`crate::matching`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{MatchRecordId, ParticipantId, PoolId};
use crate::persistence::StoreError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4003,
///     "message": "pool is cooling down; retry in 3.0 s",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Coarse failure category every [`PoolError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Pool, participant or match record absent.
    NotFound,
    /// Malformed request data.
    InvalidInput,
    /// The pool is not in a state that allows the operation.
    PreconditionFailed,
    /// Lost a race against a concurrent writer.
    Conflict,
    /// The durable store failed; the operation did not take effect.
    Unavailable,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category            | HTTP Status                 |
/// |-----------|---------------------|-----------------------------|
/// | 1000–1999 | Validation          | 400 Bad Request             |
/// | 2000–2999 | Not Found           | 404 Not Found               |
/// | 3000–3999 | Server              | 503 Service Unavailable     |
/// | 4000–4999 | Pool State          | 409 / 422                   |
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Pool with the given ID was not found.
    #[error("pool not found: {0}")]
    PoolNotFound(PoolId),

    /// Participant with the given ID was not found.
    #[error("participant not found: {0}")]
    ParticipantNotFound(ParticipantId),

    /// Match record with the given ID was not found.
    #[error("match record not found: {0}")]
    RecordNotFound(MatchRecordId),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidInput(String),

    /// The pool is past its expiry timestamp.
    #[error("pool {0} has expired")]
    PoolExpired(PoolId),

    /// Fewer than two participants are registered.
    #[error("not enough participants to match: {count} registered, at least 2 required")]
    InsufficientParticipants {
        /// Number of participants currently in the pool.
        count: usize,
    },

    /// A match was produced recently and the cooldown is still running.
    #[error("pool is cooling down; retry in {remaining_secs:.1} s")]
    CoolingDown {
        /// Seconds until the cooldown elapses, rounded to one decimal.
        remaining_secs: f64,
    },

    /// Participants cannot be removed once the pool has been matched.
    #[error("pool {0} has already been matched; participants can no longer be removed")]
    PoolAlreadyMatched(PoolId),

    /// A concurrent writer changed the pool first.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Durable store failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl PoolError {
    /// Returns the failure category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::PoolNotFound(_) | Self::ParticipantNotFound(_) | Self::RecordNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::PoolExpired(_)
            | Self::InsufficientParticipants { .. }
            | Self::CoolingDown { .. }
            | Self::PoolAlreadyMatched(_) => ErrorKind::PreconditionFailed,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Unavailable(_) => ErrorKind::Unavailable,
        }
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidInput(_) => 1001,
            Self::PoolNotFound(_) => 2001,
            Self::ParticipantNotFound(_) => 2002,
            Self::RecordNotFound(_) => 2003,
            Self::Unavailable(_) => 3001,
            Self::PoolExpired(_) => 4001,
            Self::InsufficientParticipants { .. } => 4002,
            Self::CoolingDown { .. } => 4003,
            Self::PoolAlreadyMatched(_) => 4004,
            Self::Conflict(_) => 4009,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::PreconditionFailed => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Builds a [`PoolError::CoolingDown`] with the remaining time rounded
    /// to one decimal place.
    #[must_use]
    pub fn cooling_down(remaining: chrono::Duration) -> Self {
        let millis = remaining.num_milliseconds().max(0);
        #[allow(clippy::cast_precision_loss)]
        let secs = millis as f64 / 1000.0;
        Self::CoolingDown {
            remaining_secs: (secs * 10.0).round() / 10.0,
        }
    }
}

impl From<StoreError> for PoolError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::Backend(msg) => Self::Unavailable(msg),
        }
    }
}

impl IntoResponse for PoolError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let details = match &self {
            Self::CoolingDown { remaining_secs } => Some(format!("{remaining_secs:.1}")),
            _ => None,
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
