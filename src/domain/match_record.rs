//! Immutable match history and its read-side projections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::participant::{DisplayNames, ProfileData};
use super::{MatchRecordId, ParticipantId, PoolId};

/// Label shown in place of a hidden counterpart.
pub const HIDDEN_COUNTERPART: &str = "Your match";

/// Completion state of a match record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// All pairs were written.
    #[default]
    Completed,
    /// Reserved for records written incrementally.
    InProgress,
}

impl MatchStatus {
    /// Returns the storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::InProgress => "in_progress",
        }
    }

    /// Parses the storage representation. Unknown values read as `completed`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "in_progress" => Self::InProgress,
            _ => Self::Completed,
        }
    }
}

/// One side of a pair: the participant and a snapshot of their data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairMember {
    /// Participant at match time.
    pub participant_id: ParticipantId,
    /// Profile data snapshot.
    pub data: ProfileData,
}

/// A numbered pair. `second == None` marks a lone pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPair {
    /// 1-based sequence number.
    pub pair_number: u32,
    /// First participant.
    pub first: PairMember,
    /// Second participant, absent for a lone pair.
    pub second: Option<PairMember>,
}

impl MatchPair {
    /// Whether this pair has a single participant.
    #[must_use]
    pub fn is_lone(&self) -> bool {
        self.second.is_none()
    }
}

/// One execution of the pairing algorithm. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Record identifier.
    pub id: MatchRecordId,
    /// Pool the match ran against.
    pub pool_id: PoolId,
    /// Pool name at match time.
    pub pool_name: String,
    /// Number of participants paired.
    pub participant_count: u32,
    /// Number of pairs, lone pair included.
    pub pair_count: u32,
    /// Whether the last pair is a lone pair.
    pub has_lone: bool,
    /// Completion state.
    pub status: MatchStatus,
    /// Commit timestamp.
    pub matched_at: DateTime<Utc>,
    /// Pairs ordered by `pair_number`. Empty on summary loads.
    pub pairs: Vec<MatchPair>,
}

impl MatchRecord {
    /// Builds a completed record over `pairs`.
    #[must_use]
    pub fn completed(
        pool_id: PoolId,
        pool_name: String,
        pairs: Vec<MatchPair>,
        matched_at: DateTime<Utc>,
    ) -> Self {
        let lone = pairs.iter().filter(|p| p.is_lone()).count();
        let participant_count = pairs.len() * 2 - lone;
        Self {
            id: MatchRecordId::new(),
            pool_id,
            pool_name,
            participant_count: u32::try_from(participant_count).unwrap_or(u32::MAX),
            pair_count: u32::try_from(pairs.len()).unwrap_or(u32::MAX),
            has_lone: lone > 0,
            status: MatchStatus::Completed,
            matched_at,
            pairs,
        }
    }
}

/// History list entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntry {
    /// Record identifier.
    #[schema(value_type = String, format = Uuid)]
    pub id: MatchRecordId,
    /// Pool name at match time.
    pub pool_name: String,
    /// Commit timestamp.
    pub matched_at: DateTime<Utc>,
    /// Number of participants paired.
    pub participant_count: u32,
    /// Number of pairs.
    pub pair_count: u32,
    /// Whether a lone pair exists.
    pub has_lone: bool,
    /// Completion state.
    pub status: MatchStatus,
}

impl From<&MatchRecord> for HistoryEntry {
    fn from(record: &MatchRecord) -> Self {
        Self {
            id: record.id,
            pool_name: record.pool_name.clone(),
            matched_at: record.matched_at,
            participant_count: record.participant_count,
            pair_count: record.pair_count,
            has_lone: record.has_lone,
            status: record.status,
        }
    }
}

/// A pair with resolved display names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PairView {
    /// 1-based sequence number.
    pub pair: u32,
    /// Display name of the first participant.
    pub first: String,
    /// Profile data of the first participant.
    #[schema(value_type = Object)]
    pub first_data: ProfileData,
    /// Display name of the second participant; absent for a lone pair.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second: Option<String>,
    /// Profile data of the second participant; absent for a lone pair.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub second_data: Option<ProfileData>,
}

/// Match outcome returned by `start_match` and history detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MatchResult {
    /// Record identifier.
    #[schema(value_type = String, format = Uuid)]
    pub record_id: MatchRecordId,
    /// Pool name at match time.
    pub pool_name: String,
    /// Number of participants paired.
    pub participant_count: u32,
    /// Ordered pairs.
    pub pairs: Vec<PairView>,
    /// Commit timestamp.
    pub matched_at: DateTime<Utc>,
}

impl MatchResult {
    /// Projects `record` with display names resolved by `names`.
    #[must_use]
    pub fn from_record(record: &MatchRecord, names: &DisplayNames) -> Self {
        let pairs = record
            .pairs
            .iter()
            .map(|pair| PairView {
                pair: pair.pair_number,
                first: names.resolve(&pair.first.data),
                first_data: pair.first.data.clone(),
                second: pair.second.as_ref().map(|m| names.resolve(&m.data)),
                second_data: pair.second.as_ref().map(|m| m.data.clone()),
            })
            .collect();
        Self {
            record_id: record.id,
            pool_name: record.pool_name.clone(),
            participant_count: record.participant_count,
            pairs,
            matched_at: record.matched_at,
        }
    }

    /// Keeps only the pairs involving `display_name`, replacing the
    /// counterpart with [`HIDDEN_COUNTERPART`] and a status-only payload.
    #[must_use]
    pub fn anonymised_for(self, display_name: &str) -> Self {
        let mut hidden = ProfileData::new();
        hidden.insert("status".to_string(), Value::String("matched".to_string()));

        let pairs = self
            .pairs
            .into_iter()
            .filter_map(|pair| {
                if pair.first == display_name {
                    let has_partner = pair.second.is_some();
                    Some(PairView {
                        second: has_partner.then(|| HIDDEN_COUNTERPART.to_string()),
                        second_data: has_partner.then(|| hidden.clone()),
                        ..pair
                    })
                } else if pair.second.as_deref() == Some(display_name) {
                    Some(PairView {
                        first: HIDDEN_COUNTERPART.to_string(),
                        first_data: hidden.clone(),
                        ..pair
                    })
                } else {
                    None
                }
            })
            .collect();

        Self { pairs, ..self }
    }
}
