//! Field-level views used to diff two versions of an entity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields never recorded in change history: identity, tenant, and the
/// audit stamps that every update rewrites anyway.
pub const EXCLUDED_FIELDS: &[&str] = &[
    "id",
    "tenant_id",
    "created",
    "updated",
    "deleted",
    "active",
    "created_at",
    "updated_at",
    "created_by",
    "updated_by",
    "deleted_at",
    "deleted_by",
];

/// One changed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Value before the update (`null` if the field was absent).
    pub before: Value,
    /// Value after the update (`null` if the field was removed).
    pub after: Value,
}

/// A flat field-name to value projection of an entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffView {
    fields: BTreeMap<String, Value>,
}

impl DiffView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field to the view. Excluded fields are skipped.
    pub fn field<V: Serialize + ?Sized>(mut self, name: &str, value: &V) -> Self {
        if EXCLUDED_FIELDS.contains(&name) {
            return self;
        }
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.fields.insert(name.to_string(), value);
        self
    }

    /// Number of fields in the view.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Every field whose value differs between `before` and `after`.
    pub fn changes(before: &DiffView, after: &DiffView) -> BTreeMap<String, FieldChange> {
        let mut changes = BTreeMap::new();

        for (name, old) in &before.fields {
            let new = after.fields.get(name).cloned().unwrap_or(Value::Null);
            if *old != new {
                changes.insert(
                    name.clone(),
                    FieldChange {
                        before: old.clone(),
                        after: new,
                    },
                );
            }
        }

        for (name, new) in &after.fields {
            if !before.fields.contains_key(name) && !new.is_null() {
                changes.insert(
                    name.clone(),
                    FieldChange {
                        before: Value::Null,
                        after: new.clone(),
                    },
                );
            }
        }

        changes
    }
}

/// Entities that can be projected into a [`DiffView`].
pub trait Diffable {
    fn diff_view(&self) -> DiffView;
}
