//! Breaker event listeners

use crate::resilience::CircuitState;
use std::fmt;
use tracing::{debug, error, info, warn};

/// Observer of breaker calls and transitions.
///
/// Callbacks run inline on the calling task and must not block.
pub trait CircuitBreakerListener: Send + Sync + fmt::Debug {
    fn before_call(&self, _breaker: &str) {}

    fn on_success(&self, _breaker: &str) {}

    /// Called for failures the breaker counts
    fn on_failure(&self, _breaker: &str, _error: &dyn fmt::Display) {}

    /// Called for failures the breaker passes through without counting
    fn on_ignored(&self, _breaker: &str, _error: &dyn fmt::Display) {}

    fn on_state_change(&self, _breaker: &str, _from: CircuitState, _to: CircuitState) {}
}

/// Default listener: reports to `tracing`, opening at `error`
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl CircuitBreakerListener for LoggingListener {
    fn on_failure(&self, breaker: &str, error: &dyn fmt::Display) {
        warn!(breaker = %breaker, error = %error, "🔴 Guarded call failed");
    }

    fn on_ignored(&self, breaker: &str, error: &dyn fmt::Display) {
        debug!(breaker = %breaker, error = %error, "Unexpected error passed through breaker uncounted");
    }

    fn on_state_change(&self, breaker: &str, from: CircuitState, to: CircuitState) {
        match to {
            CircuitState::Open => error!(
                breaker = %breaker,
                from = %from,
                "🔴 Circuit breaker opened (failing fast)"
            ),
            CircuitState::HalfOpen => info!(
                breaker = %breaker,
                from = %from,
                "🟡 Circuit breaker half-open (testing recovery)"
            ),
            CircuitState::Closed => info!(
                breaker = %breaker,
                from = %from,
                "🟢 Circuit breaker closed (recovered)"
            ),
        }
    }

    fn on_success(&self, breaker: &str) {
        debug!(breaker = %breaker, "🟢 Guarded call succeeded");
    }
}
