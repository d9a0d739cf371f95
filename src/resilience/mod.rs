//! # Resilience Module
//!
//! Circuit breaker guarding the publish path. Breaker bookkeeping lives in the
//! shared cache so all processes agree on whether the broker is reachable.
//!
//! ## Architecture
//!
//! - **Circuit Breakers**: Cache-backed state, single half-open probe per process
//! - **State Store**: Guarded cache access that degrades to a fallback state
//! - **Registry**: Explicit owner of breakers; rejects duplicate names
//! - **Listeners**: Pluggable observers of calls and transitions
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tasker_tracking::cache::MemoryCacheService;
//! use tasker_tracking::resilience::{CircuitBreakerConfig, CircuitBreakerRegistry};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = CircuitBreakerRegistry::<String>::new(MemoryCacheService::new().into(), "breaker");
//! let breaker = registry.register(
//!     "broker_publish",
//!     CircuitBreakerConfig::default(),
//!     Arc::new(|e: &String| e.contains("connection")),
//! )?;
//!
//! let sent = breaker.call(|| async { Ok::<_, String>("sent") }).await?;
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod listener;
pub mod registry;
pub mod state_store;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState, ErrorPredicate,
};
pub use listener::{CircuitBreakerListener, LoggingListener};
pub use registry::CircuitBreakerRegistry;
pub use state_store::BreakerStateStore;
