//! Valkey/Redis-backed cache store.
use std::time::Duration;

use async_trait::async_trait;

use crate::services::cache::client::{CacheError, CacheResult, CacheStore};

/// Valkey/Redis `CacheStore` backend.
///
/// Used when the authorization snapshot cache must be shared across a
/// cluster of frontends; a single shared store means one authority call
/// per (user, system) per TTL window across the whole fleet.
#[derive(Clone, Debug)]
pub struct ValkeyCacheStore {
    manager: redis::aio::ConnectionManager,
}

impl ValkeyCacheStore {
    /// Create a store from a URL like `redis://localhost:6379`.
    pub async fn new(url: &str) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::BackendConnection(e.to_string()))?;

        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError::BackendConnection(e.to_string()))?;

        Ok(Self { manager })
    }
}

#[async_trait]
impl CacheStore for ValkeyCacheStore {
    fn backend_name(&self) -> &'static str {
        "valkey"
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        // Use a clone of the connection manager.
        let mut conn = self.manager.clone();

        let resp: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendCommand(e.to_string()))?;

        Ok(resp)
    }

    async fn set_string_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> CacheResult<()> {
        let mut conn = self.manager.clone();

        // EX expects integer seconds. Clamp to at least 1 sec.
        let ttl_seconds: u64 = ttl.as_secs().max(1);

        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_seconds)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CacheError::BackendCommand(e.to_string()))?;

        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<u64> {
        let mut conn = self.manager.clone();

        // DEL returns number of keys removed (0 or 1 for a single key).
        let n: u64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendCommand(e.to_string()))?;

        Ok(n)
    }

    async fn flush(&self) -> CacheResult<()> {
        let mut conn = self.manager.clone();

        // The contract is "drop every entry", so FLUSHDB rather than a
        // key-pattern scan. Run the authorization cache in its own DB index.
        redis::cmd("FLUSHDB")
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CacheError::BackendCommand(e.to_string()))?;

        Ok(())
    }
}
