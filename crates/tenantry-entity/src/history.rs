//! Change-history entry model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use tenantry_core::context::TenantContext;
use tenantry_core::diff::FieldChange;

/// Trigger name recorded for update diffs.
pub const TRIGGER_UPDATE: &str = "Update";

/// One append-only record of the fields an update changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct HistoryEntry {
    /// Unique entry identifier.
    pub id: Uuid,
    /// Identifier of the changed entity, rendered as a string.
    pub entity_id: String,
    /// Entity type name (e.g. `"Customer"`).
    pub entity_type: String,
    /// Tenant that owned the change, if any.
    pub tenant_id: Option<String>,
    /// What triggered the entry. Always [`TRIGGER_UPDATE`] today.
    pub trigger_name: String,
    /// When the triggering action happened.
    pub trigger_at: DateTime<Utc>,
    /// Who performed the triggering action.
    pub trigger_by: String,
    /// Changed fields with before/after values.
    #[sqlx(json)]
    pub changes: BTreeMap<String, FieldChange>,
}

impl HistoryEntry {
    /// Builds an update entry for `entity_id` from the request context.
    pub fn update(
        ctx: &TenantContext,
        entity_type: &str,
        entity_id: String,
        changes: BTreeMap<String, FieldChange>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            entity_id,
            entity_type: entity_type.to_string(),
            tenant_id: ctx.tenant_id().map(str::to_string),
            trigger_name: TRIGGER_UPDATE.to_string(),
            trigger_at: ctx.action_at(),
            trigger_by: ctx.actor_label().to_string(),
            changes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_entry_takes_context_fields() {
        let ctx = TenantContext::now().with_tenant("t1").with_actor("u1", "Ana");
        let mut changes = BTreeMap::new();
        changes.insert(
            "name".to_string(),
            FieldChange {
                before: json!("Ana"),
                after: json!("Ana Maria"),
            },
        );

        let entry = HistoryEntry::update(&ctx, "Customer", "c-1".into(), changes);
        assert_eq!(entry.trigger_name, "Update");
        assert_eq!(entry.tenant_id.as_deref(), Some("t1"));
        assert_eq!(entry.trigger_by, "Ana");
        assert_eq!(entry.trigger_at, ctx.action_at());
        assert_eq!(entry.changes.len(), 1);
    }
}
