//! Randomized pairing: entropy supply, shuffling, and pair assignment.
//!
//! ```text
//! MatchingEngine ──▶ Shuffler ──▶ EntropySource ──▶ IntegerSource (random.org)
//!                                        └──────────▶ local StdRng (fallback)
//! ```

pub mod engine;
pub mod entropy;
pub mod random_org;
pub mod shuffle;

pub use engine::{InsufficientParticipants, MatchingEngine, Pairing};
pub use entropy::{EntropyError, EntropySource, IntegerSource};
pub use random_org::RandomOrgClient;
pub use shuffle::Shuffler;
