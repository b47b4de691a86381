//! Core type definitions used across the Tenantry workspace.

pub mod filter;
pub mod pagination;
pub mod pipeline;

pub use filter::{FilterValue, Filters};
pub use pagination::{MAX_TAKE, SkipTake};
pub use pipeline::PipelineStage;
