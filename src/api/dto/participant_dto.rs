//! Participant and history request bodies and query strings.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::domain::ProfileData;

/// Request body for `POST /pools/{id}/participants`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct JoinPoolRequest {
    /// Values keyed by the pool's field names.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: ProfileData,
    /// Optional contact token used to find the registration again.
    #[serde(default)]
    pub contact: Option<String>,
}

/// Query string for `GET /participants`.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ContactQuery {
    /// Substring of the contact token to search for.
    pub contact: String,
}

/// Query string for `GET /history/{id}/participant`.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ParticipantNameQuery {
    /// Display name of the participant whose pairs are requested.
    pub name: String,
}
