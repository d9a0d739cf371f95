//! Cache service trait definition

use super::errors::CacheResult;

/// Operations the breaker state store needs from a shared cache.
///
/// Values are durable: nothing written through this trait expires. A missing
/// key is `Ok(None)`, never an error.
pub trait CacheService: Send + Sync {
    /// Get a value by key
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = CacheResult<Option<String>>> + Send;

    /// Set a value with no expiry
    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl std::future::Future<Output = CacheResult<()>> + Send;

    /// Atomically increment an integer value, creating it at zero first if absent.
    /// Returns the value after the increment.
    fn incr(&self, key: &str) -> impl std::future::Future<Output = CacheResult<i64>> + Send;

    /// Delete a key
    fn delete(&self, key: &str) -> impl std::future::Future<Output = CacheResult<()>> + Send;

    /// Check if the cache backend is reachable
    fn health_check(&self) -> impl std::future::Future<Output = CacheResult<bool>> + Send;

    /// Name of the backend
    fn provider_name(&self) -> &'static str;
}
