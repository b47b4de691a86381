//! Cache key builders for repository cache entries.
//!
//! Keys are `{entity_type}:{operation}:{id}` for point lookups and
//! `{entity_type}:{operation}:tenant:{tenant_id}` for tenant-scoped lists.
//! The provider adds its configured prefix on top.

use std::fmt::Display;

/// Operation segment for point lookups.
pub const OP_GET: &str = "get";
/// Operation segment for list results.
pub const OP_LIST: &str = "list";

/// Cache key for one entity fetched by ID.
pub fn entity_by_id(entity_type: &str, id: impl Display) -> String {
    format!("{entity_type}:{OP_GET}:{id}")
}

/// Cache key for a tenant's unfiltered list of an entity type.
pub fn tenant_list(entity_type: &str, tenant_id: &str) -> String {
    format!("{entity_type}:{OP_LIST}:tenant:{tenant_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_key_format() {
        assert_eq!(entity_by_id("Customer", 42), "Customer:get:42");
    }

    #[test]
    fn test_tenant_list_key_format() {
        assert_eq!(tenant_list("Customer", "t1"), "Customer:list:tenant:t1");
    }
}
