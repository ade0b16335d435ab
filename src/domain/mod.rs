//! Domain layer: identifiers, pools, participants, match history, and the
//! pool lifecycle.
//!
//! Everything here is synchronous and free of I/O. Time enters only as an
//! explicit `now` argument, supplied by a [`Clock`].

pub mod clock;
pub mod ids;
pub mod lifecycle;
pub mod match_record;
pub mod participant;
pub mod pool;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ids::{MatchRecordId, ParticipantId, PoolId};
pub use match_record::{
    HistoryEntry, MatchPair, MatchRecord, MatchResult, MatchStatus, PairMember, PairView,
};
pub use participant::{
    DisplayNames, Participant, ParticipantSearchHit, ParticipantView, ProfileData,
};
pub use pool::{
    FieldType, NewPool, Pool, PoolField, PoolSnapshot, PoolStatus, PoolView, StoredStatus,
};
