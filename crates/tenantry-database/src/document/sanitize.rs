//! Filter sanitization for the document store.
//!
//! Every filter map reaching the database passes through [`sanitize_filters`].
//! Offending entries are dropped and logged; only an oversized map is an error.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use tenantry_core::error::AppError;
use tenantry_core::result::AppResult;
use tenantry_core::types::filter::{FilterValue, Filters};

pub const MAX_FILTER_KEYS: usize = 20;
pub const MAX_KEY_LEN: usize = 50;
pub const MAX_STRING_LEN: usize = 1000;
pub const MAX_DEPTH: usize = 3;
pub const MAX_ARRAY_LEN: usize = 100;

/// Dotted paths accepted even though they fail the plain identifier pattern.
const SAFE_FIELDS: &[&str] = &[
    "_id",
    "tenant_id",
    "name",
    "email",
    "status",
    "active",
    "created.set_at",
    "created.by_name",
    "created.by_id",
    "created.active",
    "updated.set_at",
    "updated.by_name",
    "updated.by_id",
    "deleted.set_at",
    "deleted.by_name",
    "deleted.by_id",
    "deleted.active",
];

const BLOCKED_KEY_PARTS: &[&str] = &["$", ".", "javascript", "eval", "function", "where"];

const BLOCKED_VALUE_PARTS: &[&str] = &["$", "javascript:", "eval(", "function(", "where"];

static FIELD_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]{0,49}$").expect("valid field name regex"));

/// Whether `key` may be used as a filter or sort field.
pub fn is_valid_field_name(key: &str) -> bool {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return false;
    }
    if SAFE_FIELDS.contains(&key) {
        return true;
    }
    let lowered = key.to_lowercase();
    if BLOCKED_KEY_PARTS.iter().any(|part| lowered.contains(part)) {
        return false;
    }
    FIELD_NAME.is_match(key)
}

/// Returns a copy of `filters` with unsafe keys and values removed.
///
/// More than [`MAX_FILTER_KEYS`] keys is rejected outright.
pub fn sanitize_filters(filters: &Filters) -> AppResult<Filters> {
    if filters.len() > MAX_FILTER_KEYS {
        return Err(AppError::validation(format!(
            "Too many filters: {} (max {MAX_FILTER_KEYS})",
            filters.len()
        )));
    }

    let mut clean = Filters::new();
    for (key, value) in filters.iter() {
        if !is_valid_field_name(key) {
            warn!(field = %key, reason = "invalid field name", "Dropped filter");
            continue;
        }
        match sanitize_value(value, 0) {
            Ok(value) => clean.insert(key.clone(), value),
            Err(reason) => warn!(field = %key, reason, "Dropped filter"),
        }
    }
    Ok(clean)
}

fn sanitize_value(value: &FilterValue, depth: usize) -> Result<FilterValue, &'static str> {
    if depth > MAX_DEPTH {
        return Err("nesting too deep");
    }

    match value {
        FilterValue::Null
        | FilterValue::Bool(_)
        | FilterValue::Int(_)
        | FilterValue::Float(_)
        | FilterValue::Uuid(_) => Ok(value.clone()),
        FilterValue::String(s) => {
            if s.chars().count() > MAX_STRING_LEN {
                return Err("string too long");
            }
            let lowered = s.to_lowercase();
            if BLOCKED_VALUE_PARTS.iter().any(|part| lowered.contains(part)) {
                return Err("blocked pattern in value");
            }
            Ok(value.clone())
        }
        FilterValue::List(items) => {
            if items.len() > MAX_ARRAY_LEN {
                return Err("array too long");
            }
            items
                .iter()
                .map(|item| sanitize_value(item, depth + 1))
                .collect::<Result<Vec<_>, _>>()
                .map(FilterValue::List)
        }
        FilterValue::Object(map) => {
            let mut clean = BTreeMap::new();
            for (key, nested) in map {
                if !is_valid_field_name(key) {
                    warn!(field = %key, reason = "invalid nested field name", "Dropped filter");
                    continue;
                }
                clean.insert(key.clone(), sanitize_value(nested, depth + 1)?);
            }
            Ok(FilterValue::Object(clean))
        }
    }
}
