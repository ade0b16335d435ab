//! Pool aggregate, its field schema, and the read-side view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::PoolId;
use super::lifecycle;
use crate::error::PoolError;

/// Status as persisted in the durable store.
///
/// `expired` is never stored: it is derived from `valid_until` at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoredStatus {
    /// Accepting participants and eligible for matching.
    Active,
    /// A match was produced for the current cycle.
    Matched,
}

impl StoredStatus {
    /// Returns the storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Matched => "matched",
        }
    }

    /// Parses the storage representation. Unknown values read as `active`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "matched" => Self::Matched,
            _ => Self::Active,
        }
    }
}

/// Effective status shown to callers and used for eligibility checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    /// Open for joins and matching.
    Active,
    /// Matched and still inside its cooldown window.
    Matched,
    /// Past its expiry timestamp.
    Expired,
}

/// Input widget type of a configured profile field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Single-line text.
    #[default]
    Text,
    /// Multi-line text.
    Textarea,
    /// Numeric input.
    Number,
    /// Email address.
    Email,
    /// URL.
    Url,
}

impl FieldType {
    /// Returns the storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Textarea => "textarea",
            Self::Number => "number",
            Self::Email => "email",
            Self::Url => "url",
        }
    }

    /// Parses the storage representation. Unknown values read as `text`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "textarea" => Self::Textarea,
            "number" => Self::Number,
            "email" => Self::Email,
            "url" => Self::Url,
            _ => Self::Text,
        }
    }
}

/// One entry of a pool's ordered profile schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PoolField {
    /// Key under which the value is stored in participant data.
    pub name: String,
    /// Human-readable label.
    pub label: String,
    /// Input type.
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    /// Whether joining requires a non-empty value.
    #[serde(default)]
    pub required: bool,
    /// Display position (ascending).
    #[serde(default)]
    pub order: i32,
}

/// Request to create a pool.
#[derive(Debug, Clone)]
pub struct NewPool {
    /// Display name; must not be blank.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Expiry timestamp.
    pub valid_until: DateTime<Utc>,
    /// Cooldown in seconds; `None` or a non-positive value selects the default.
    pub cooldown_secs: Option<i64>,
    /// Profile schema.
    pub fields: Vec<PoolField>,
}

/// A pool as persisted in the durable store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    /// Pool identifier.
    pub id: PoolId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Expiry timestamp.
    pub valid_until: DateTime<Utc>,
    /// Minimum seconds between two matches.
    pub cooldown_secs: u32,
    /// Persisted status flag.
    pub status: StoredStatus,
    /// Timestamp of the last committed match.
    pub last_matched_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Profile schema sorted by `order`.
    pub fields: Vec<PoolField>,
}

impl Pool {
    /// Validates `spec` and builds a fresh `active` pool.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidInput`] when the name is blank, a field
    /// name is blank, or two fields share a name.
    pub fn create(
        spec: NewPool,
        now: DateTime<Utc>,
        default_cooldown_secs: u32,
    ) -> Result<Self, PoolError> {
        let name = spec.name.trim();
        if name.is_empty() {
            return Err(PoolError::InvalidInput("pool name must not be empty".to_string()));
        }

        let mut fields = spec.fields;
        for (i, field) in fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                return Err(PoolError::InvalidInput(format!(
                    "field #{} has an empty name",
                    i + 1
                )));
            }
            if fields.iter().skip(i + 1).any(|other| other.name == field.name) {
                return Err(PoolError::InvalidInput(format!(
                    "duplicate field name: {}",
                    field.name
                )));
            }
        }
        fields.sort_by_key(|f| f.order);

        let cooldown_secs = match spec.cooldown_secs {
            Some(secs) if secs > 0 => u32::try_from(secs).unwrap_or(u32::MAX),
            _ => default_cooldown_secs,
        };

        Ok(Self {
            id: PoolId::new(),
            name: name.to_string(),
            description: spec.description,
            valid_until: spec.valid_until,
            cooldown_secs,
            status: StoredStatus::Active,
            last_matched_at: None,
            created_at: now,
            fields,
        })
    }

    /// Cooldown as a [`chrono::Duration`].
    #[must_use]
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.cooldown_secs))
    }
}

/// Stored pool plus its participant count, as held in the read cache.
///
/// Deliberately free of time-dependent fields: the effective status is
/// folded in by [`PoolView::at`] on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// Stored pool.
    pub pool: Pool,
    /// Number of participants at load time.
    pub participant_count: u64,
}

/// Read-side projection of a pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PoolView {
    /// Pool identifier.
    #[schema(value_type = String, format = Uuid)]
    pub id: PoolId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Number of participants.
    pub participant_count: u64,
    /// Expiry timestamp.
    pub valid_until: DateTime<Utc>,
    /// Effective status at read time.
    pub status: PoolStatus,
    /// Cooldown in seconds.
    pub cooldown_secs: u32,
    /// Timestamp of the last committed match.
    pub last_matched_at: Option<DateTime<Utc>>,
    /// Ordered profile schema.
    pub fields: Vec<PoolField>,
}

impl PoolView {
    /// Projects `snapshot` as seen at `now`.
    #[must_use]
    pub fn at(snapshot: PoolSnapshot, now: DateTime<Utc>) -> Self {
        let status = lifecycle::effective_status(&snapshot.pool, now);
        let pool = snapshot.pool;
        Self {
            id: pool.id,
            name: pool.name,
            description: pool.description,
            participant_count: snapshot.participant_count,
            valid_until: pool.valid_until,
            status,
            cooldown_secs: pool.cooldown_secs,
            last_matched_at: pool.last_matched_at,
            fields: pool.fields,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn field(name: &str, order: i32) -> PoolField {
        PoolField {
            name: name.to_string(),
            label: name.to_uppercase(),
            field_type: FieldType::Text,
            required: false,
            order,
        }
    }

    fn spec(fields: Vec<PoolField>, cooldown_secs: Option<i64>) -> NewPool {
        NewPool {
            name: "  Secret Santa ".to_string(),
            description: String::new(),
            valid_until: Utc::now() + chrono::Duration::days(1),
            cooldown_secs,
            fields,
        }
    }

    #[test]
    fn create_sorts_fields_and_trims_name() {
        let Ok(pool) = Pool::create(
            spec(vec![field("hobby", 2), field("name", 1)], Some(30)),
            Utc::now(),
            5,
        ) else {
            panic!("valid pool");
        };
        assert_eq!(pool.name, "Secret Santa");
        assert_eq!(pool.status, StoredStatus::Active);
        assert!(pool.last_matched_at.is_none());
        assert_eq!(pool.cooldown_secs, 30);
        let names: Vec<&str> = pool.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["name", "hobby"]);
    }

    #[test]
    fn non_positive_cooldown_uses_default() {
        let Ok(pool) = Pool::create(spec(Vec::new(), Some(0)), Utc::now(), 5) else {
            panic!("valid pool");
        };
        assert_eq!(pool.cooldown_secs, 5);
        let Ok(pool) = Pool::create(spec(Vec::new(), None), Utc::now(), 7) else {
            panic!("valid pool");
        };
        assert_eq!(pool.cooldown_secs, 7);
    }

    #[test]
    fn rejects_blank_name_and_duplicate_fields() {
        let mut blank = spec(Vec::new(), None);
        blank.name = "   ".to_string();
        assert!(matches!(
            Pool::create(blank, Utc::now(), 5),
            Err(PoolError::InvalidInput(_))
        ));

        let dup = spec(vec![field("name", 1), field("name", 2)], None);
        assert!(matches!(
            Pool::create(dup, Utc::now(), 5),
            Err(PoolError::InvalidInput(_))
        ));
    }

    #[test]
    fn stored_status_parse_defaults_to_active() {
        assert_eq!(StoredStatus::parse("matched"), StoredStatus::Matched);
        assert_eq!(StoredStatus::parse("expired"), StoredStatus::Active);
        assert_eq!(FieldType::parse("email"), FieldType::Email);
    }
}
