//! In-memory cache built on `DashMap` with a soft byte budget.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use tenantry_core::config::cache::{CacheConfig, MemoryCacheConfig};
use tenantry_core::lifecycle::PeriodicJob;
use tenantry_core::result::AppResult;
use tenantry_core::traits::cache::CacheProvider;

#[derive(Debug, Clone)]
struct CacheEntry {
    data: Bytes,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory cache provider.
///
/// Expired entries are dropped lazily on read and in bulk by
/// [`purge_expired`](Self::purge_expired). When an insert would push the
/// size estimate past `max_memory_bytes` (or the entry count past
/// `max_entries`), the first expired entry found is evicted; if none is
/// found the insert still goes through. This is not LRU.
#[derive(Debug)]
pub struct MemoryCacheProvider {
    /// Stored entries, keyed with the prefix applied.
    entries: DashMap<String, CacheEntry>,
    /// Running estimate of key plus payload bytes.
    size_bytes: AtomicUsize,
    /// TTL used when a caller passes zero.
    default_ttl: Duration,
    /// Prefix applied to every key.
    key_prefix: String,
    max_entries: usize,
    max_memory_bytes: usize,
    sweep_interval: Duration,
}

impl MemoryCacheProvider {
    /// Create a new in-memory cache from configuration.
    pub fn new(config: &MemoryCacheConfig, default_ttl: Duration, key_prefix: &str) -> Self {
        Self {
            entries: DashMap::new(),
            size_bytes: AtomicUsize::new(0),
            default_ttl,
            key_prefix: key_prefix.to_string(),
            max_entries: config.max_entries,
            max_memory_bytes: config.max_memory_bytes,
            sweep_interval: Duration::from_secs(config.sweep_interval_seconds),
        }
    }

    /// Create a provider from the top-level cache section.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(&config.memory, config.default_ttl(), &config.key_prefix)
    }

    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current size estimate in bytes.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes.load(Ordering::Relaxed)
    }

    /// Removes every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0usize;
        let mut freed = 0usize;

        self.entries.retain(|key, entry| {
            if entry.is_expired(now) {
                removed += 1;
                freed += entry_size(key, &entry.data);
                false
            } else {
                true
            }
        });

        self.size_bytes.fetch_sub(freed, Ordering::Relaxed);
        removed
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    fn would_exceed(&self, incoming: usize, key_exists: bool) -> bool {
        let over_memory = self.size_bytes() + incoming > self.max_memory_bytes;
        let over_count = !key_exists && self.entries.len() >= self.max_entries;
        over_memory || over_count
    }

    /// Evicts the first expired entry encountered, if any.
    fn evict_first_expired(&self) -> bool {
        let now = Instant::now();
        let candidate = self
            .entries
            .iter()
            .find(|entry| entry.value().is_expired(now))
            .map(|entry| entry.key().clone());

        match candidate {
            Some(key) => self.remove_if_expired(&key, now),
            None => false,
        }
    }

    fn remove_if_expired(&self, key: &str, now: Instant) -> bool {
        match self.entries.remove_if(key, |_, entry| entry.is_expired(now)) {
            Some((key, entry)) => {
                self.size_bytes
                    .fetch_sub(entry_size(&key, &entry.data), Ordering::Relaxed);
                true
            }
            None => false,
        }
    }
}

fn entry_size(key: &str, data: &Bytes) -> usize {
    key.len() + data.len()
}

#[async_trait]
impl CacheProvider for MemoryCacheProvider {
    async fn get(&self, key: &str) -> AppResult<Option<Bytes>> {
        let key = self.full_key(key);
        let now = Instant::now();

        let expired = match self.entries.get(&key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.data.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.remove_if_expired(&key, now);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> AppResult<()> {
        let key = self.full_key(key);
        let ttl = if ttl.is_zero() { self.default_ttl } else { ttl };
        let incoming = entry_size(&key, &value);

        if self.would_exceed(incoming, self.entries.contains_key(&key)) && !self.evict_first_expired()
        {
            debug!(
                size_bytes = self.size_bytes(),
                max_memory_bytes = self.max_memory_bytes,
                "Cache over budget with nothing expired to evict"
            );
        }

        let entry = CacheEntry {
            data: value,
            expires_at: Instant::now() + ttl,
        };

        self.size_bytes.fetch_add(incoming, Ordering::Relaxed);
        if let Some(previous) = self.entries.insert(key.clone(), entry) {
            self.size_bytes
                .fetch_sub(entry_size(&key, &previous.data), Ordering::Relaxed);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        if let Some((key, entry)) = self.entries.remove(&self.full_key(key)) {
            self.size_bytes
                .fetch_sub(entry_size(&key, &entry.data), Ordering::Relaxed);
        }
        Ok(())
    }

    async fn clear(&self) -> AppResult<()> {
        self.entries.clear();
        self.size_bytes.store(0, Ordering::Relaxed);
        Ok(())
    }
}

/// Periodic job removing expired entries from a [`MemoryCacheProvider`].
#[derive(Debug, Clone)]
pub struct CacheSweepJob {
    cache: Arc<MemoryCacheProvider>,
}

impl CacheSweepJob {
    pub fn new(cache: Arc<MemoryCacheProvider>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl PeriodicJob for CacheSweepJob {
    fn name(&self) -> &str {
        "cache-sweep"
    }

    fn interval(&self) -> Duration {
        self.cache.sweep_interval
    }

    async fn run_once(&self) {
        let removed = self.cache.purge_expired();
        if removed > 0 {
            debug!(
                removed,
                remaining = self.cache.len(),
                size_bytes = self.cache.size_bytes(),
                "Swept expired cache entries"
            );
        }
    }
}
