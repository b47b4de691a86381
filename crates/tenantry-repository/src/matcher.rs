//! Evaluates [`Filters`] against the JSON form of an entity.
//!
//! Semantics mirror the document store: `Null` matches an absent or null
//! field, objects match partially, numbers compare numerically, and dotted
//! keys walk nested objects.

use serde_json::Value;

use tenantry_core::types::filter::{FilterValue, Filters};

/// Whether `document` satisfies every filter.
pub fn matches(document: &Value, filters: &Filters) -> bool {
    filters
        .iter()
        .all(|(key, expected)| field_matches(lookup(document, key), expected))
}

fn lookup<'a>(document: &'a Value, key: &str) -> Option<&'a Value> {
    let key = if key == "_id" { "id" } else { key };
    if let Some(value) = document.get(key) {
        return Some(value);
    }
    key.split('.')
        .try_fold(document, |current, segment| current.get(segment))
}

fn field_matches(actual: Option<&Value>, expected: &FilterValue) -> bool {
    match (actual, expected) {
        (None | Some(Value::Null), FilterValue::Null) => true,
        (_, FilterValue::Null) | (None, _) => false,
        (Some(actual), expected) => json_matches(actual, &expected.to_json()),
    }
}

fn json_matches(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        (Value::Object(actual), Value::Object(expected)) => expected.iter().all(|(k, v)| match actual.get(k) {
            Some(a) => json_matches(a, v),
            None => v.is_null(),
        }),
        (Value::Array(actual), Value::Array(expected)) => {
            actual.len() == expected.len()
                && actual.iter().zip(expected).all(|(a, e)| json_matches(a, e))
        }
        (a, e) => a == e,
    }
}
