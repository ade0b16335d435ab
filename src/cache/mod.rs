//! Read-through caching and the invalidation contract.
//!
//! The cache is an optimisation only: [`ReadThroughCache`] absorbs every
//! backend failure, and [`Mutation::stale_keys`] lists exactly which keys a
//! write must purge to keep readers coherent.

pub mod backend;
pub mod invalidation;
pub mod keys;
pub mod read_through;

pub use backend::{CacheBackend, CacheError, MemoryCache};
pub use invalidation::Mutation;
pub use keys::{CacheKey, CacheTtl, TtlPolicy};
pub use read_through::ReadThroughCache;
