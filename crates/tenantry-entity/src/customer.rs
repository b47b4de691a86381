//! Customer record served by the demo resource.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use tenantry_core::audit::{AuditInfo, RichAuditable};
use tenantry_core::diff::{DiffView, Diffable};
use tenantry_core::traits::repository::Identified;

/// A tenant-owned customer with rich audit stamps.
///
/// Audit fields and `tenant_id` are written by the audit layer; values sent
/// by clients are overwritten.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct Customer {
    #[serde(default)]
    pub id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    #[serde(default)]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub created: Option<AuditInfo>,
    #[serde(default)]
    pub updated: Option<AuditInfo>,
    #[serde(default)]
    pub deleted: Option<AuditInfo>,
}

impl Customer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

impl Identified<Uuid> for Customer {
    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
}

impl RichAuditable for Customer {
    fn created(&self) -> Option<&AuditInfo> {
        self.created.as_ref()
    }

    fn set_created(&mut self, info: AuditInfo) {
        self.created = Some(info);
    }

    fn set_updated(&mut self, info: AuditInfo) {
        self.updated = Some(info);
    }

    fn deleted(&self) -> Option<&AuditInfo> {
        self.deleted.as_ref()
    }

    fn set_deleted(&mut self, info: AuditInfo) {
        self.deleted = Some(info);
    }

    fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    fn set_tenant_id(&mut self, tenant_id: Option<String>) {
        self.tenant_id = tenant_id;
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

tenantry_core::rich_auditable!(Customer);

impl Diffable for Customer {
    fn diff_view(&self) -> DiffView {
        DiffView::new()
            .field("name", &self.name)
            .field("email", &self.email)
            .field("status", &self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_payload_deserializes() {
        let customer: Customer = serde_json::from_value(json!({"name": "Ana"})).unwrap();
        assert!(customer.id.is_nil());
        assert!(customer.created.is_none());
        assert!(customer.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_fields() {
        let customer = Customer::new("").with_email("not-an-email");
        let errors = customer.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
    }

    #[test]
    fn test_diff_view_tracks_business_fields_only() {
        let before = Customer::new("Ana");
        let mut after = before.clone();
        after.name = "Ana Maria".into();
        after.active = true;

        let changes = DiffView::changes(&before.diff_view(), &after.diff_view());
        assert_eq!(changes.len(), 1);
        assert_eq!(changes["name"].after, json!("Ana Maria"));
    }
}
