//! # tenantry-cache
//!
//! Cache provider implementations for Tenantry. The in-process `memory`
//! provider is a byte-budgeted map with lazy expiry on read and a periodic
//! sweep; there is no replication or cross-process coordination.
//!
//! The provider is selected at runtime based on configuration.

pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;

pub use provider::CacheManager;
