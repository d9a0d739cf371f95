//! # Circuit Breaker Registry
//!
//! Explicit, start-up constructed owner of every breaker in the process.
//! Names are unique within a registry because the name is also the cache
//! namespace: two breakers sharing one would silently share state.

use crate::cache::CacheProvider;
use crate::resilience::circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, ErrorPredicate,
};
use crate::resilience::listener::{CircuitBreakerListener, LoggingListener};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Bound on each breaker cache call unless configured otherwise
const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_millis(500);

pub struct CircuitBreakerRegistry<E> {
    cache: CacheProvider,
    key_prefix: String,
    cache_timeout: Duration,
    listeners: Vec<Arc<dyn CircuitBreakerListener>>,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker<E>>>>,
}

impl<E> fmt::Debug for CircuitBreakerRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("key_prefix", &self.key_prefix)
            .field("cache_timeout", &self.cache_timeout)
            .field("breakers", &self.breakers.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<E> CircuitBreakerRegistry<E>
where
    E: fmt::Display + Send + Sync + 'static,
{
    /// Registry whose breakers report to [`LoggingListener`]
    pub fn new(cache: CacheProvider, key_prefix: impl Into<String>) -> Self {
        Self::with_listeners(cache, key_prefix, vec![Arc::new(LoggingListener)])
    }

    pub fn with_listeners(
        cache: CacheProvider,
        key_prefix: impl Into<String>,
        listeners: Vec<Arc<dyn CircuitBreakerListener>>,
    ) -> Self {
        Self {
            cache,
            key_prefix: key_prefix.into(),
            cache_timeout: DEFAULT_CACHE_TIMEOUT,
            listeners,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Bound every cache call made by breakers registered after this;
    /// a call that runs past it is treated as a cache outage
    pub fn with_cache_timeout(mut self, timeout: Duration) -> Self {
        self.cache_timeout = timeout;
        self
    }

    /// Construct and register a breaker, failing fast if the name is taken
    pub fn register(
        &self,
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        is_expected: ErrorPredicate<E>,
    ) -> Result<Arc<CircuitBreaker<E>>, CircuitBreakerError<E>> {
        let name = name.into();
        let mut breakers = self.breakers.write();
        if breakers.contains_key(&name) {
            return Err(CircuitBreakerError::DuplicateName { name });
        }

        let breaker = Arc::new(CircuitBreaker::new(
            name.clone(),
            config,
            self.cache.clone(),
            &self.key_prefix,
            self.cache_timeout,
            is_expected,
            self.listeners.clone(),
        ));
        breakers.insert(name.clone(), Arc::clone(&breaker));

        info!(breaker = %name, total = breakers.len(), "Registered circuit breaker");
        Ok(breaker)
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker<E>>> {
        self.breakers.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.breakers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheService;

    fn registry() -> CircuitBreakerRegistry<String> {
        CircuitBreakerRegistry::new(MemoryCacheService::new().into(), "test")
    }

    fn always() -> ErrorPredicate<String> {
        Arc::new(|_: &String| true)
    }

    #[test]
    fn test_duplicate_name_fails_fast() {
        let registry = registry();
        registry
            .register("publish", CircuitBreakerConfig::default(), always())
            .unwrap();

        let duplicate = registry.register("publish", CircuitBreakerConfig::default(), always());
        assert!(matches!(
            duplicate,
            Err(CircuitBreakerError::DuplicateName { ref name }) if name == "publish"
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_by_name() {
        let registry = registry();
        let breaker = registry
            .register("publish", CircuitBreakerConfig::default(), always())
            .unwrap();
        registry
            .register("cache", CircuitBreakerConfig::default(), always())
            .unwrap();

        assert!(Arc::ptr_eq(&registry.get("publish").unwrap(), &breaker));
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names(), vec!["cache", "publish"]);
    }
}
