//! Cache store interface used by the authorization core.
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-layer errors (transport/command/serialization).
///
/// Kept independent from `AppError` so callers can decide how to fail
/// (authorization loads fail closed, diagnostics may fail open).
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    BackendConnection(String),
    #[error("cache command error: {0}")]
    BackendCommand(String),
    #[error("cache value error: {0}")]
    InvalidValue(String),
}

/// A minimal cache interface.
///
/// Intentionally small and string-based:
/// - The authorization snapshot cache needs `GET`, `SET` with TTL, and a
///   full flush. Callers serialize their own values.
/// - Backends are interchangeable (in-process map or Valkey/Redis), so the
///   surface stays at the lowest common denominator.
///
/// Held as `Arc<dyn CacheStore>` by the services that consume it.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Cache backend name (for logging).
    fn backend_name(&self) -> &'static str;

    /// Get a UTF-8 string value. Expired or absent keys return `None`.
    async fn get_string(&self, key: &str) -> CacheResult<Option<String>>;

    /// Set a value with TTL, replacing any existing entry.
    ///
    /// Replacing a stale entry with a fresh one is always safe; writes are
    /// idempotent for the snapshot shapes stored here.
    async fn set_string_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> CacheResult<()>;

    /// Delete a key. Returns number of deleted keys.
    async fn del(&self, key: &str) -> CacheResult<u64>;

    /// Remove every entry from the store, not just one caller's keys.
    async fn flush(&self) -> CacheResult<()>;
}
