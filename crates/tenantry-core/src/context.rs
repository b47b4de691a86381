//! Per-request tenant context carrying the tenant, the acting user, and the action time.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::audit::AuditInfo;
use crate::error::AppError;
use crate::result::AppResult;

/// Context for the current request.
///
/// Built once at the edge (HTTP extractor, job runner, test) and passed by
/// reference into every repository call. The builder methods consume `self`
/// and are only used while constructing it.
///
/// A missing tenant is not an error: read paths simply lose tenant scoping.
#[derive(Debug, Clone)]
pub struct TenantContext {
    tenant_id: Option<String>,
    actor_id: Option<String>,
    actor_name: Option<String>,
    action_at: DateTime<Utc>,
    deadline: Option<Instant>,
}

impl TenantContext {
    /// Creates a context with no tenant and no actor, stamped at `action_at`.
    pub fn new(action_at: DateTime<Utc>) -> Self {
        Self {
            tenant_id: None,
            actor_id: None,
            actor_name: None,
            action_at,
            deadline: None,
        }
    }

    /// Creates a context stamped with the current time.
    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    /// Sets the tenant. Empty strings are treated as "no tenant".
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = non_empty(tenant_id.into());
        self
    }

    /// Sets the acting user's ID and display name.
    pub fn with_actor(mut self, actor_id: impl Into<String>, actor_name: impl Into<String>) -> Self {
        self.actor_id = non_empty(actor_id.into());
        self.actor_name = non_empty(actor_name.into());
        self
    }

    /// Bounds every storage call made on behalf of this context.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Convenience for [`with_deadline`](Self::with_deadline) relative to now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// The tenant ID, if one was established.
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    /// The acting user's ID.
    pub fn actor_id(&self) -> Option<&str> {
        self.actor_id.as_deref()
    }

    /// The acting user's display name.
    pub fn actor_name(&self) -> Option<&str> {
        self.actor_name.as_deref()
    }

    /// When the action was initiated (request arrival time).
    pub fn action_at(&self) -> DateTime<Utc> {
        self.action_at
    }

    /// The storage deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Display name of the actor, falling back to the actor ID.
    pub fn actor_label(&self) -> &str {
        self.actor_name
            .as_deref()
            .or(self.actor_id.as_deref())
            .unwrap_or_default()
    }

    /// Builds an audit stamp for the current action.
    pub fn audit_stamp(&self, active: bool) -> AuditInfo {
        AuditInfo {
            set_at: self.action_at,
            by_name: self.actor_label().to_string(),
            by_id: self.actor_id.clone().unwrap_or_default(),
            active,
        }
    }

    /// Runs a storage future, failing with an internal error once the deadline passes.
    pub async fn run<T, F>(&self, operation: &str, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut).await.map_err(|_| {
                tracing::warn!(operation, "Storage call exceeded the request deadline");
                AppError::internal(format!("{operation} exceeded the request deadline"))
            })?,
            None => fut.await,
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tenant_is_none() {
        let ctx = TenantContext::now().with_tenant("");
        assert_eq!(ctx.tenant_id(), None);
    }

    #[test]
    fn test_audit_stamp_uses_actor_and_time() {
        let at = Utc::now();
        let ctx = TenantContext::new(at)
            .with_tenant("t1")
            .with_actor("u-42", "Ana");
        let stamp = ctx.audit_stamp(true);

        assert_eq!(stamp.set_at, at);
        assert_eq!(stamp.by_name, "Ana");
        assert_eq!(stamp.by_id, "u-42");
        assert!(stamp.active);
    }

    #[test]
    fn test_actor_label_falls_back_to_id() {
        let ctx = TenantContext::now().with_actor("u-1", "");
        assert_eq!(ctx.actor_label(), "u-1");
        assert_eq!(TenantContext::now().actor_label(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_honors_deadline() {
        let ctx = TenantContext::now().with_timeout(Duration::from_millis(50));
        let result: AppResult<()> = ctx
            .run("slow query", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Internal);
    }

    #[tokio::test]
    async fn test_run_without_deadline_passes_through() {
        let ctx = TenantContext::now();
        let value = ctx.run("fast query", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
