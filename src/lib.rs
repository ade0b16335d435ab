//! # pairpool
//!
//! Participant pools with cache-coherent reads and randomized pairing.
//!
//! Organizers create a pool with a profile schema, participants join with
//! free-form data, and a match shuffles everyone (remote true-random
//! entropy first, local generator on any failure) and pairs them in order.
//! A pool cools down after each match; its effective status is always
//! computed from stored fields and the current time.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── PoolService / HistoryService (service/)
//!     │       │
//!     │       ├── lifecycle rules (domain/)
//!     │       ├── MatchingEngine → Shuffler → EntropySource (matching/)
//!     │       └── ReadThroughCache + invalidation (cache/)
//!     │
//!     └── PoolStore: PostgreSQL or in-memory (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod matching;
pub mod persistence;
pub mod service;
