//! Core traits defined in `tenantry-core` and implemented by other crates.

pub mod cache;
pub mod repository;

pub use cache::CacheProvider;
pub use repository::{EntityId, Identified, Repository};
