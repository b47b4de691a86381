//! `Tenant` extractor: builds the per-request `TenantContext`.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};

use tenantry_core::context::TenantContext;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// Identity placed in request extensions by an upstream auth layer.
///
/// Takes priority over the identity headers.
#[derive(Debug, Clone, Default)]
pub struct ActorClaims {
    pub subject: String,
    pub tenant_id: Option<String>,
    pub display_name: Option<String>,
}

/// When the request reached the service. Stamped by the metrics middleware.
#[derive(Debug, Clone, Copy)]
pub struct RequestArrival(pub DateTime<Utc>);

/// The request's tenant context.
#[derive(Debug, Clone)]
pub struct Tenant(pub TenantContext);

impl std::ops::Deref for Tenant {
    type Target = TenantContext;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

impl<S> FromRequestParts<S> for Tenant
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let action_at = parts
            .extensions
            .get::<RequestArrival>()
            .map(|arrival| arrival.0)
            .unwrap_or_else(Utc::now);
        let claims = parts.extensions.get::<ActorClaims>().cloned();

        let tenant_id = claims
            .as_ref()
            .and_then(|c| c.tenant_id.clone())
            .or_else(|| header(parts, TENANT_HEADER));
        let actor_id = claims
            .as_ref()
            .map(|c| c.subject.clone())
            .filter(|s| !s.is_empty())
            .or_else(|| header(parts, USER_ID_HEADER));
        let actor_name = claims
            .as_ref()
            .and_then(|c| c.display_name.clone())
            .or_else(|| header(parts, USER_NAME_HEADER));

        let mut ctx = TenantContext::new(action_at);
        if let Some(tenant_id) = tenant_id {
            ctx = ctx.with_tenant(tenant_id);
        }
        if actor_id.is_some() || actor_name.is_some() {
            ctx = ctx.with_actor(actor_id.unwrap_or_default(), actor_name.unwrap_or_default());
        }

        Ok(Tenant(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> TenantContext {
        let (mut parts, _) = request.into_parts();
        Tenant::from_request_parts(&mut parts, &()).await.unwrap().0
    }

    #[tokio::test]
    async fn test_headers_build_context() {
        let arrival = Utc::now() - chrono::TimeDelta::seconds(5);
        let mut request = Request::builder()
            .header("X-Tenant-ID", "t1")
            .header("X-User-ID", "u1")
            .header("X-User-Name", "Ana")
            .body(())
            .unwrap();
        request.extensions_mut().insert(RequestArrival(arrival));

        let ctx = extract(request).await;
        assert_eq!(ctx.tenant_id(), Some("t1"));
        assert_eq!(ctx.actor_id(), Some("u1"));
        assert_eq!(ctx.actor_name(), Some("Ana"));
        assert_eq!(ctx.action_at(), arrival);
    }

    #[tokio::test]
    async fn test_claims_take_priority_over_headers() {
        let mut request = Request::builder()
            .header("X-Tenant-ID", "spoofed")
            .header("X-User-ID", "u9")
            .body(())
            .unwrap();
        request.extensions_mut().insert(ActorClaims {
            subject: "u1".into(),
            tenant_id: Some("t1".into()),
            display_name: Some("Ana".into()),
        });

        let ctx = extract(request).await;
        assert_eq!(ctx.tenant_id(), Some("t1"));
        assert_eq!(ctx.actor_id(), Some("u1"));
        assert_eq!(ctx.actor_name(), Some("Ana"));
    }

    #[tokio::test]
    async fn test_anonymous_request() {
        let ctx = extract(Request::builder().body(()).unwrap()).await;
        assert_eq!(ctx.tenant_id(), None);
        assert_eq!(ctx.actor_label(), "");
    }
}
