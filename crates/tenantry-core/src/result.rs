//! Convenience result type alias for Tenantry.

use crate::error::AppError;

/// A specialized `Result` type for Tenantry operations.
pub type AppResult<T> = Result<T, AppError>;
