//! Generic document storage over the JSONB `documents` table.

pub mod query;
pub mod sanitize;
pub mod store;

pub use sanitize::{is_valid_field_name, sanitize_filters};
pub use store::DocumentStore;
