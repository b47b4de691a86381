//! Typed aggregation pipeline understood by the document store.

use serde::{Deserialize, Serialize};

use crate::types::filter::Filters;

/// One aggregation stage, applied in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Keep documents matching every filter (sanitized like any read filter).
    Match(Filters),
    /// Order by a top-level document field.
    Sort { field: String, descending: bool },
    Skip(u64),
    Limit(u64),
}
