//! # tenantry-repository
//!
//! The repository pipeline. A base store (in-memory here, PostgreSQL in
//! `tenantry-database`) is wrapped by decorators that each add one concern:
//!
//! ```text
//! CachedRepository -> HistoryRepository -> AuditRepository -> base store
//! ```
//!
//! Every layer implements [`Repository`](tenantry_core::traits::Repository)
//! and holds no locks of its own.

pub mod audit;
pub mod cached;
pub mod history;
pub mod matcher;
pub mod memory;
pub mod pipeline;

pub use audit::AuditRepository;
pub use cached::CachedRepository;
pub use history::{EntityHistory, HistoryRepository, HistoryStore, MemoryHistoryStore};
pub use memory::MemoryRepository;
pub use pipeline::{Pipeline, PipelineBuilder};
