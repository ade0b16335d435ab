//! Data Transfer Objects for REST request deserialization.
//!
//! Responses reuse the read-side projections from [`crate::domain`]
//! directly; only request bodies and query strings live here.

pub mod participant_dto;
pub mod pool_dto;

pub use participant_dto::*;
pub use pool_dto::*;
