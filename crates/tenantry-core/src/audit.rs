//! Audit capabilities an entity can expose to the audit decorator.
//!
//! An entity opts into auditing through exactly one of two shapes:
//!
//! - [`RichAuditable`]: three [`AuditInfo`] stamps (`created`, `updated`,
//!   `deleted`) plus an active flag.
//! - [`LegacyAuditable`]: separate timestamp and actor-string fields.
//!
//! [`Auditable`] resolves which shape applies, statically through
//! [`Auditable::SHAPE`] and at runtime through [`AuditHooks`]. Entities with
//! neither shape use [`unaudited!`](crate::unaudited) and pass through the
//! decorator unmodified.
//!
//! Scoping filters rely on the entity serializing its tenant under
//! [`TENANT_FIELD`] and its soft-delete marker under [`DELETED_FIELD`] or
//! [`LEGACY_DELETED_FIELD`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serialized field holding the owning tenant.
pub const TENANT_FIELD: &str = "tenant_id";
/// Serialized field holding the rich soft-delete stamp.
pub const DELETED_FIELD: &str = "deleted";
/// Serialized field holding the legacy soft-delete timestamp.
pub const LEGACY_DELETED_FIELD: &str = "deleted_at";

/// Who did something, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditInfo {
    /// When the lifecycle event happened.
    pub set_at: DateTime<Utc>,
    /// Display name of the actor.
    pub by_name: String,
    /// Identifier of the actor.
    pub by_id: String,
    /// Whether the record was active after the event.
    pub active: bool,
}

/// Entities carrying `created`/`updated`/`deleted` [`AuditInfo`] stamps.
pub trait RichAuditable {
    /// The creation stamp, if the record has been created.
    fn created(&self) -> Option<&AuditInfo>;
    fn set_created(&mut self, info: AuditInfo);
    fn set_updated(&mut self, info: AuditInfo);
    /// The soft-delete stamp. Present means the record is deleted.
    fn deleted(&self) -> Option<&AuditInfo>;
    fn set_deleted(&mut self, info: AuditInfo);
    fn tenant_id(&self) -> Option<&str>;
    fn set_tenant_id(&mut self, tenant_id: Option<String>);
    fn set_active(&mut self, active: bool);
}

/// Entities carrying flat audit timestamps and actor strings.
pub trait LegacyAuditable {
    fn created_at(&self) -> Option<DateTime<Utc>>;
    fn created_by(&self) -> Option<&str>;
    fn set_created_at(&mut self, at: DateTime<Utc>);
    fn set_created_by(&mut self, by: String);
    fn set_updated_at(&mut self, at: DateTime<Utc>);
    fn set_updated_by(&mut self, by: String);
    /// The soft-delete timestamp. Present means the record is deleted.
    fn deleted_at(&self) -> Option<DateTime<Utc>>;
    fn set_deleted_at(&mut self, at: DateTime<Utc>);
    fn set_deleted_by(&mut self, by: String);
    fn tenant_id(&self) -> Option<&str>;
    fn set_tenant_id(&mut self, tenant_id: Option<String>);
}

/// The audit shape of an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditShape {
    Rich,
    Legacy,
    Unaudited,
}

impl AuditShape {
    /// The serialized field whose presence marks a soft-deleted record.
    pub fn soft_delete_field(self) -> Option<&'static str> {
        match self {
            Self::Rich => Some(DELETED_FIELD),
            Self::Legacy => Some(LEGACY_DELETED_FIELD),
            Self::Unaudited => None,
        }
    }

    /// Whether records of this shape carry a tenant and audit stamps.
    pub fn is_audited(self) -> bool {
        !matches!(self, Self::Unaudited)
    }
}

/// Mutable access to whichever audit shape an entity implements.
pub enum AuditHooks<'a> {
    Rich(&'a mut dyn RichAuditable),
    Legacy(&'a mut dyn LegacyAuditable),
    Unaudited,
}

/// Capability probe used by the audit decorator.
///
/// Usually implemented through [`rich_auditable!`](crate::rich_auditable),
/// [`legacy_auditable!`](crate::legacy_auditable) or
/// [`unaudited!`](crate::unaudited).
pub trait Auditable {
    /// The audit shape shared by every value of this type.
    const SHAPE: AuditShape;

    fn audit_hooks(&mut self) -> AuditHooks<'_>;

    fn is_soft_deleted(&self) -> bool;

    /// The owning tenant, for audited shapes.
    fn owner_tenant(&self) -> Option<&str>;
}

/// Implements [`Auditable`] for a type that implements [`RichAuditable`].
#[macro_export]
macro_rules! rich_auditable {
    ($ty:ty) => {
        impl $crate::audit::Auditable for $ty {
            const SHAPE: $crate::audit::AuditShape = $crate::audit::AuditShape::Rich;

            fn audit_hooks(&mut self) -> $crate::audit::AuditHooks<'_> {
                $crate::audit::AuditHooks::Rich(self)
            }

            fn is_soft_deleted(&self) -> bool {
                $crate::audit::RichAuditable::deleted(self).is_some()
            }

            fn owner_tenant(&self) -> Option<&str> {
                $crate::audit::RichAuditable::tenant_id(self)
            }
        }
    };
}

/// Implements [`Auditable`] for a type that implements [`LegacyAuditable`].
#[macro_export]
macro_rules! legacy_auditable {
    ($ty:ty) => {
        impl $crate::audit::Auditable for $ty {
            const SHAPE: $crate::audit::AuditShape = $crate::audit::AuditShape::Legacy;

            fn audit_hooks(&mut self) -> $crate::audit::AuditHooks<'_> {
                $crate::audit::AuditHooks::Legacy(self)
            }

            fn is_soft_deleted(&self) -> bool {
                $crate::audit::LegacyAuditable::deleted_at(self).is_some()
            }

            fn owner_tenant(&self) -> Option<&str> {
                $crate::audit::LegacyAuditable::tenant_id(self)
            }
        }
    };
}

/// Implements [`Auditable`] for a type with no audit fields.
#[macro_export]
macro_rules! unaudited {
    ($ty:ty) => {
        impl $crate::audit::Auditable for $ty {
            const SHAPE: $crate::audit::AuditShape = $crate::audit::AuditShape::Unaudited;

            fn audit_hooks(&mut self) -> $crate::audit::AuditHooks<'_> {
                $crate::audit::AuditHooks::Unaudited
            }

            fn is_soft_deleted(&self) -> bool {
                false
            }

            fn owner_tenant(&self) -> Option<&str> {
                None
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Note {
        tenant_id: Option<String>,
        created: Option<AuditInfo>,
        deleted: Option<AuditInfo>,
        active: bool,
    }

    impl RichAuditable for Note {
        fn created(&self) -> Option<&AuditInfo> {
            self.created.as_ref()
        }
        fn set_created(&mut self, info: AuditInfo) {
            self.created = Some(info);
        }
        fn set_updated(&mut self, _info: AuditInfo) {}
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

    crate::rich_auditable!(Note);

    struct Plain;
    crate::unaudited!(Plain);

    #[test]
    fn test_shape_fields() {
        assert_eq!(AuditShape::Rich.soft_delete_field(), Some("deleted"));
        assert_eq!(AuditShape::Legacy.soft_delete_field(), Some("deleted_at"));
        assert_eq!(AuditShape::Unaudited.soft_delete_field(), None);
        assert_eq!(<Note as Auditable>::SHAPE, AuditShape::Rich);
        assert_eq!(<Plain as Auditable>::SHAPE, AuditShape::Unaudited);
    }

    #[test]
    fn test_hooks_mutate_through_probe() {
        let mut note = Note::default();
        let stamp = AuditInfo {
            set_at: Utc::now(),
            by_name: "Ana".into(),
            by_id: "u1".into(),
            active: false,
        };

        match note.audit_hooks() {
            AuditHooks::Rich(hooks) => {
                hooks.set_deleted(stamp);
                hooks.set_active(false);
                hooks.set_tenant_id(Some("t1".into()));
            }
            _ => panic!("expected rich hooks"),
        }

        assert!(note.is_soft_deleted());
        assert_eq!(note.owner_tenant(), Some("t1"));
        assert!(!note.active);
    }
}
