//! Cache provider trait for pluggable caching backends.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::result::AppResult;

/// Byte-oriented cache backend.
///
/// The provider owns key prefixing and TTL enforcement. A zero TTL means
/// "use the provider's default". Callers treat every error as advisory:
/// a failed `get` is a miss and a failed `set`/`delete` is logged and ignored.
#[async_trait]
pub trait CacheProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Get a payload by key. `None` if the key does not exist or has expired.
    async fn get(&self, key: &str) -> AppResult<Option<Bytes>>;

    /// Store a payload with a TTL.
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> AppResult<()>;

    /// Delete a key from the cache.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Remove every entry.
    async fn clear(&self) -> AppResult<()>;

    /// Get a typed value by deserializing from JSON.
    async fn get_json<T: serde::de::DeserializeOwned + Send>(
        &self,
        key: &str,
    ) -> AppResult<Option<T>>
    where
        Self: Sized,
    {
        match self.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Set a typed value by serializing to JSON.
    async fn set_json<T: serde::Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> AppResult<()>
    where
        Self: Sized,
    {
        let json = serde_json::to_vec(value)?;
        self.set(key, Bytes::from(json), ttl).await
    }
}
