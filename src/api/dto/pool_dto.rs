//! Pool-related request bodies.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::{NewPool, PoolField};

/// Request body for `POST /pools`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePoolRequest {
    /// Display name; must not be blank.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Expiry timestamp (RFC 3339).
    pub valid_until: DateTime<Utc>,
    /// Minimum seconds between two matches. Omitted or non-positive selects
    /// the server default.
    #[serde(default)]
    pub cooldown_secs: Option<i64>,
    /// Ordered profile schema participants fill in on join.
    #[serde(default)]
    pub fields: Vec<PoolField>,
}

impl From<CreatePoolRequest> for NewPool {
    fn from(req: CreatePoolRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            valid_until: req.valid_until,
            cooldown_secs: req.cooldown_secs,
            fields: req.fields,
        }
    }
}
