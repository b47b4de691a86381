//! # tenantry-core
//!
//! Core crate for Tenantry. Contains the repository and cache contracts,
//! configuration schemas, the per-request tenant context, audit capability
//! traits, diffable views, filter/pagination types, background task
//! lifecycle, and the unified error system.
//!
//! This crate has **no** internal dependencies on other Tenantry crates.

pub mod audit;
pub mod config;
pub mod context;
pub mod diff;
pub mod error;
pub mod lifecycle;
pub mod result;
pub mod traits;
pub mod types;

pub use context::TenantContext;
pub use error::AppError;
pub use result::AppResult;
