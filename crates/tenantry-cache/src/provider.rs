//! Cache manager that dispatches to the configured provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::info;

use tenantry_core::config::cache::CacheConfig;
use tenantry_core::error::AppError;
use tenantry_core::lifecycle::PeriodicJob;
use tenantry_core::result::AppResult;
use tenantry_core::traits::cache::CacheProvider;

/// Cache manager that wraps the configured cache provider.
///
/// The provider is selected at construction time based on configuration.
/// Providers that need housekeeping expose it through
/// [`background_jobs`](Self::background_jobs); the caller decides who runs them.
#[derive(Clone)]
pub struct CacheManager {
    /// The inner cache provider.
    inner: Arc<dyn CacheProvider>,
    /// Housekeeping jobs for the provider.
    jobs: Vec<Arc<dyn PeriodicJob>>,
}

impl CacheManager {
    /// Create a new cache manager from configuration.
    pub fn new(config: &CacheConfig) -> AppResult<Self> {
        match config.provider.as_str() {
            #[cfg(feature = "memory")]
            "memory" => {
                info!(
                    ttl_secs = config.default_ttl_seconds,
                    max_entries = config.memory.max_entries,
                    max_memory_bytes = config.memory.max_memory_bytes,
                    "Initializing in-memory cache provider"
                );
                let provider = Arc::new(crate::memory::MemoryCacheProvider::from_config(config));
                let sweep: Arc<dyn PeriodicJob> =
                    Arc::new(crate::memory::CacheSweepJob::new(Arc::clone(&provider)));
                Ok(Self {
                    inner: provider,
                    jobs: vec![sweep],
                })
            }
            other => Err(AppError::configuration(format!(
                "Unknown cache provider: '{other}'. Supported: memory"
            ))),
        }
    }

    /// Create a cache manager from an existing provider (for testing).
    pub fn from_provider(provider: Arc<dyn CacheProvider>) -> Self {
        Self {
            inner: provider,
            jobs: Vec::new(),
        }
    }

    /// Get a shared handle to the inner provider.
    pub fn provider(&self) -> Arc<dyn CacheProvider> {
        Arc::clone(&self.inner)
    }

    /// Periodic jobs the provider needs (e.g. the expiry sweep).
    pub fn background_jobs(&self) -> Vec<Arc<dyn PeriodicJob>> {
        self.jobs.clone()
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("inner", &self.inner)
            .field("jobs", &self.jobs.len())
            .finish()
    }
}

#[async_trait]
impl CacheProvider for CacheManager {
    async fn get(&self, key: &str) -> AppResult<Option<Bytes>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> AppResult<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.inner.delete(key).await
    }

    async fn clear(&self) -> AppResult<()> {
        self.inner.clear().await
    }
}
