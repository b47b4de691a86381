//! Cache provider configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache provider type. Only `"memory"` is supported.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Default TTL for cached entries in seconds.
    #[serde(default = "default_ttl")]
    pub default_ttl_seconds: u64,
    /// Prefix prepended to every key written by the provider.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// In-memory cache configuration.
    #[serde(default)]
    pub memory: MemoryCacheConfig,
}

impl CacheConfig {
    /// Default TTL as a [`Duration`].
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            default_ttl_seconds: default_ttl(),
            key_prefix: default_key_prefix(),
            memory: MemoryCacheConfig::default(),
        }
    }
}

/// In-memory cache backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCacheConfig {
    /// Soft cap on the number of entries.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Soft cap on the estimated byte size of keys plus payloads.
    #[serde(default = "default_max_memory_bytes")]
    pub max_memory_bytes: usize,
    /// Interval of the background expiry sweep in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            max_memory_bytes: default_max_memory_bytes(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_ttl() -> u64 {
    600
}

fn default_key_prefix() -> String {
    "tenantry:".to_string()
}

fn default_max_entries() -> usize {
    10_000
}

fn default_max_memory_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_sweep_interval() -> u64 {
    300
}
