//! # Breaker State Store
//!
//! Cache-backed bookkeeping for one breaker: state, failure counter and the
//! time the breaker last opened. Keys are namespaced per breaker:
//!
//! ```text
//! {prefix}:{name}:state         closed | open | half_open
//! {prefix}:{name}:fail_counter  integer, INCR'd atomically
//! {prefix}:{name}:opened_at     RFC 3339 timestamp
//! ```
//!
//! Every operation is guarded and bounded by an operation timeout. Reads that
//! fail or time out return the configured fallback, writes are logged and
//! dropped. Nothing here returns an error.

use crate::cache::{CacheError, CacheProvider, CacheResult, CacheService};
use crate::resilience::CircuitState;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct BreakerStateStore {
    cache: CacheProvider,
    breaker: String,
    state_key: String,
    counter_key: String,
    opened_at_key: String,
    fallback_state: CircuitState,
    operation_timeout: Duration,
}

impl BreakerStateStore {
    pub fn new(
        cache: CacheProvider,
        key_prefix: &str,
        breaker: &str,
        fallback_state: CircuitState,
    ) -> Self {
        let namespace = format!("{key_prefix}:{breaker}");
        Self {
            cache,
            breaker: breaker.to_string(),
            state_key: format!("{namespace}:state"),
            counter_key: format!("{namespace}:fail_counter"),
            opened_at_key: format!("{namespace}:opened_at"),
            fallback_state,
            operation_timeout: Duration::from_millis(500),
        }
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    async fn bounded<T>(&self, operation: impl Future<Output = CacheResult<T>>) -> CacheResult<T> {
        tokio::time::timeout(self.operation_timeout, operation)
            .await
            .unwrap_or_else(|_| {
                Err(CacheError::Timeout(format!(
                    "no reply within {}ms",
                    self.operation_timeout.as_millis()
                )))
            })
    }

    /// Current state; a missing key means closed, an unreachable cache means the fallback
    pub async fn state(&self) -> CircuitState {
        match self.bounded(self.cache.get(&self.state_key)).await {
            Ok(Some(raw)) => match raw.parse::<CircuitState>() {
                Ok(state) => state,
                Err(_) => {
                    warn!(
                        breaker = %self.breaker,
                        value = %raw,
                        fallback = %self.fallback_state,
                        "Unrecognized breaker state in cache, using fallback"
                    );
                    self.fallback_state
                }
            },
            Ok(None) => CircuitState::Closed,
            Err(e) => {
                warn!(
                    breaker = %self.breaker,
                    error = %e,
                    fallback = %self.fallback_state,
                    "Breaker state cache unreachable, using fallback state"
                );
                self.fallback_state
            }
        }
    }

    pub async fn set_state(&self, state: CircuitState) {
        if let Err(e) = self.bounded(self.cache.set(&self.state_key, state.as_str())).await {
            warn!(
                breaker = %self.breaker,
                state = %state,
                error = %e,
                "Dropped breaker state write, cache unreachable"
            );
        }
    }

    /// Failure count; 0 when absent or unreadable
    pub async fn fail_counter(&self) -> u32 {
        match self.bounded(self.cache.get(&self.counter_key)).await {
            Ok(Some(raw)) => raw.parse::<u32>().unwrap_or(0),
            Ok(None) => 0,
            Err(e) => {
                warn!(breaker = %self.breaker, error = %e, "Breaker counter unreadable");
                0
            }
        }
    }

    /// Atomically increment the failure counter.
    ///
    /// `None` when the cache is unreachable, in which case the failure is not counted.
    pub async fn increment_counter(&self) -> Option<u32> {
        match self.bounded(self.cache.incr(&self.counter_key)).await {
            Ok(value) => Some(u32::try_from(value.max(0)).unwrap_or(u32::MAX)),
            Err(e) => {
                warn!(
                    breaker = %self.breaker,
                    error = %e,
                    "Dropped breaker failure count, cache unreachable"
                );
                None
            }
        }
    }

    pub async fn reset_counter(&self) {
        if let Err(e) = self.bounded(self.cache.set(&self.counter_key, "0")).await {
            warn!(
                breaker = %self.breaker,
                error = %e,
                "Dropped breaker counter reset, cache unreachable"
            );
        }
    }

    pub async fn opened_at(&self) -> Option<DateTime<Utc>> {
        match self.bounded(self.cache.get(&self.opened_at_key)).await {
            Ok(Some(raw)) => DateTime::parse_from_rfc3339(&raw)
                .map(|at| at.with_timezone(&Utc))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                debug!(breaker = %self.breaker, error = %e, "Breaker opened_at unreadable");
                None
            }
        }
    }

    pub async fn set_opened_at(&self, at: DateTime<Utc>) {
        if let Err(e) = self.bounded(self.cache.set(&self.opened_at_key, &at.to_rfc3339())).await {
            warn!(
                breaker = %self.breaker,
                error = %e,
                "Dropped breaker opened_at write, cache unreachable"
            );
        }
    }
}
