//! Participants and display-name resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::lifecycle;
use super::pool::{Pool, PoolStatus, StoredStatus};
use super::{ParticipantId, PoolId};
use crate::error::PoolError;

/// Free-form profile data keyed by field name.
pub type ProfileData = Map<String, Value>;

/// Placeholder used when no candidate key yields a name.
pub const ANONYMOUS: &str = "Anonymous";

/// A participant registered in exactly one pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Participant identifier.
    pub id: ParticipantId,
    /// Owning pool.
    pub pool_id: PoolId,
    /// Profile data as submitted on join.
    pub data: ProfileData,
    /// Contact token used to find the participant again for removal.
    pub contact: Option<String>,
    /// Join timestamp.
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    /// Validates `data` against `pool`'s schema and builds a participant.
    ///
    /// Every required field must be present with a non-empty value. Keys
    /// outside the schema are kept as-is.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidInput`] naming the first missing field.
    pub fn join(
        pool: &Pool,
        data: ProfileData,
        contact: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, PoolError> {
        if let Some(missing) = pool
            .fields
            .iter()
            .filter(|f| f.required)
            .find(|f| data.get(&f.name).is_none_or(is_blank))
        {
            return Err(PoolError::InvalidInput(format!(
                "missing required field: {}",
                missing.label
            )));
        }

        Ok(Self {
            id: ParticipantId::new(),
            pool_id: pool.id,
            data,
            contact: contact
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            joined_at: now,
        })
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Ordered candidate keys used to pick a human-readable name out of
/// arbitrary profile data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayNames {
    keys: Vec<String>,
}

impl DisplayNames {
    /// Creates a resolver over `keys`, tried in order.
    #[must_use]
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }

    /// Candidate keys in priority order.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Resolves a display name for `data`. See [`display_name`].
    #[must_use]
    pub fn resolve(&self, data: &ProfileData) -> String {
        display_name(&self.keys, data)
    }
}

impl Default for DisplayNames {
    fn default() -> Self {
        Self::new(
            ["name", "nickname", "username", "display_name"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        )
    }
}

/// Returns the first non-empty string stored under one of `keys`; failing
/// that, the first non-empty string value in key order; failing that,
/// [`ANONYMOUS`].
#[must_use]
pub fn display_name(keys: &[String], data: &ProfileData) -> String {
    keys.iter()
        .filter_map(|key| data.get(key))
        .chain(data.values())
        .find_map(|value| match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        })
        .unwrap_or_else(|| ANONYMOUS.to_string())
}

/// Participant as listed under its pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ParticipantView {
    /// Participant identifier.
    #[schema(value_type = String, format = Uuid)]
    pub id: ParticipantId,
    /// Resolved display name.
    pub display_name: String,
    /// Profile data.
    #[schema(value_type = Object)]
    pub data: ProfileData,
    /// Contact token, if one was given.
    pub contact: Option<String>,
    /// Join timestamp.
    pub joined_at: DateTime<Utc>,
}

impl ParticipantView {
    /// Projects `participant`, resolving its display name with `names`.
    #[must_use]
    pub fn new(participant: Participant, names: &DisplayNames) -> Self {
        Self {
            id: participant.id,
            display_name: names.resolve(&participant.data),
            data: participant.data,
            contact: participant.contact,
            joined_at: participant.joined_at,
        }
    }
}

/// A participant found by contact search, with its pool's context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ParticipantSearchHit {
    /// Participant identifier.
    #[schema(value_type = String, format = Uuid)]
    pub id: ParticipantId,
    /// Resolved display name.
    pub display_name: String,
    /// Contact token.
    pub contact: Option<String>,
    /// Owning pool.
    #[schema(value_type = String, format = Uuid)]
    pub pool_id: PoolId,
    /// Owning pool's name.
    pub pool_name: String,
    /// Join timestamp.
    pub joined_at: DateTime<Utc>,
    /// `matched` while the pool's stored flag is set, else `expired` past
    /// expiry, else `active`.
    pub status: PoolStatus,
}

impl ParticipantSearchHit {
    /// Builds a hit for `participant` in `pool` as seen at `now`.
    #[must_use]
    pub fn new(
        participant: Participant,
        pool: &Pool,
        names: &DisplayNames,
        now: DateTime<Utc>,
    ) -> Self {
        let status = if pool.status == StoredStatus::Matched {
            PoolStatus::Matched
        } else if lifecycle::is_expired(pool, now) {
            PoolStatus::Expired
        } else {
            PoolStatus::Active
        };
        Self {
            id: participant.id,
            display_name: names.resolve(&participant.data),
            contact: participant.contact,
            pool_id: pool.id,
            pool_name: pool.name.clone(),
            joined_at: participant.joined_at,
            status,
        }
    }
}
