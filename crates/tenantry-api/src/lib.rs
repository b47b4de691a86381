//! # tenantry-api
//!
//! HTTP boundary for Tenantry built on Axum.
//!
//! Builds the per-request [`TenantContext`](tenantry_core::TenantContext),
//! exposes repository pipelines as resource routes, serves request metrics,
//! and maps [`AppError`](tenantry_core::AppError) kinds to status codes inside
//! the standard JSON envelope.

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
