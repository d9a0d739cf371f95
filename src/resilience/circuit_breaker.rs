//! # Circuit Breaker Implementation
//!
//! Classic three-state breaker (Closed, Open, Half-Open) whose bookkeeping
//! lives in a shared cache so every process guarding the same dependency sees
//! the same state. Updates are individually atomic cache operations, never a
//! multi-key compare-and-swap, so concurrent processes may mis-count by one.

use crate::cache::CacheProvider;
use crate::resilience::listener::CircuitBreakerListener;
use crate::resilience::state_store::BreakerStateStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    #[default]
    Closed,
    /// Failure mode - all calls fail fast without executing
    Open,
    /// Testing recovery - a single probe call is allowed through
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CircuitState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "closed" => Ok(Self::Closed),
            "open" => Ok(Self::Open),
            "half_open" => Ok(Self::HalfOpen),
            other => Err(format!("unknown circuit state: {other}")),
        }
    }
}

/// Errors that can occur during circuit breaker operation
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, the guarded operation was not invoked
    #[error("Circuit breaker is open for {name}")]
    CircuitOpen { name: String },

    /// The guarded operation ran and returned this error
    #[error("Operation failed: {0}")]
    OperationFailed(E),

    /// A breaker with this name is already registered
    #[error("Circuit breaker name already registered: {name}")]
    DuplicateName { name: String },
}

impl<E> CircuitBreakerError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// The operation's own error, if the operation ran
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::OperationFailed(e) => Some(e),
            _ => None,
        }
    }
}

/// Runtime breaker parameters
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Recognized failures before opening
    pub fail_max: u32,
    /// How long the breaker stays open before the next call becomes a probe
    pub reset_timeout: Duration,
    /// State assumed when the cache cannot be read
    pub fallback_state: CircuitState,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            fail_max: 5,
            reset_timeout: Duration::from_secs(60),
            fallback_state: CircuitState::Closed,
        }
    }
}

/// Decides whether an operation error counts toward `fail_max`
pub type ErrorPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Holds this process's half-open probe slot; released on drop, so a probe
/// whose future is cancelled frees the slot too
struct ProbeSlot<'a>(&'a AtomicBool);

impl Drop for ProbeSlot<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Cache-backed circuit breaker guarding calls that fail with `E`.
///
/// Built through [`CircuitBreakerRegistry`](super::CircuitBreakerRegistry),
/// which rejects duplicate names.
pub struct CircuitBreaker<E> {
    name: String,
    config: CircuitBreakerConfig,
    store: BreakerStateStore,
    is_expected: ErrorPredicate<E>,
    listeners: Vec<Arc<dyn CircuitBreakerListener>>,
    /// Set while this process has a half-open probe in flight
    probe_in_flight: AtomicBool,
}

impl<E> fmt::Debug for CircuitBreaker<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

impl<E> CircuitBreaker<E>
where
    E: fmt::Display + Send + Sync + 'static,
{
    pub(crate) fn new(
        name: String,
        config: CircuitBreakerConfig,
        cache: CacheProvider,
        key_prefix: &str,
        cache_timeout: Duration,
        is_expected: ErrorPredicate<E>,
        listeners: Vec<Arc<dyn CircuitBreakerListener>>,
    ) -> Self {
        info!(
            breaker = %name,
            fail_max = config.fail_max,
            reset_timeout_seconds = config.reset_timeout.as_secs(),
            fallback_state = %config.fallback_state,
            cache = cache_kind(&cache),
            "🛡️ Circuit breaker initialized"
        );

        let store = BreakerStateStore::new(cache, key_prefix, &name, config.fallback_state)
            .with_operation_timeout(cache_timeout);
        Self {
            name,
            config,
            store,
            is_expected,
            listeners,
            probe_in_flight: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// State as recorded in the shared cache, or the fallback if it is unreachable
    pub async fn current_state(&self) -> CircuitState {
        self.store.state().await
    }

    pub async fn fail_counter(&self) -> u32 {
        self.store.fail_counter().await
    }

    /// Execute an operation with circuit breaker protection.
    ///
    /// Unexpected errors pass through as `OperationFailed` without touching
    /// the breaker's bookkeeping; listeners see them through `on_ignored`.
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        for listener in &self.listeners {
            listener.before_call(&self.name);
        }

        let probe = self.admit().await?;
        let probing = probe.is_some();

        let outcome = match operation().await {
            Ok(value) => {
                self.handle_success(probing).await;
                Ok(value)
            }
            Err(error) if (self.is_expected)(&error) => {
                self.handle_failure(probing, &error).await;
                Err(CircuitBreakerError::OperationFailed(error))
            }
            Err(error) => {
                for listener in &self.listeners {
                    listener.on_ignored(&self.name, &error);
                }
                Err(CircuitBreakerError::OperationFailed(error))
            }
        };
        drop(probe);
        outcome
    }

    /// Admits the call, holding the probe slot when the call is a half-open probe
    async fn admit(&self) -> Result<Option<ProbeSlot<'_>>, CircuitBreakerError<E>> {
        match self.store.state().await {
            CircuitState::Closed => Ok(None),
            CircuitState::Open => {
                if !self.reset_timeout_elapsed().await {
                    return Err(self.open_error());
                }
                let slot = self.try_begin_probe().ok_or_else(|| self.open_error())?;
                self.transition(CircuitState::Open, CircuitState::HalfOpen)
                    .await;
                Ok(Some(slot))
            }
            CircuitState::HalfOpen => self
                .try_begin_probe()
                .map(Some)
                .ok_or_else(|| self.open_error()),
        }
    }

    fn open_error(&self) -> CircuitBreakerError<E> {
        debug!(breaker = %self.name, "Rejected call, circuit open");
        CircuitBreakerError::CircuitOpen {
            name: self.name.clone(),
        }
    }

    fn try_begin_probe(&self) -> Option<ProbeSlot<'_>> {
        self.probe_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ProbeSlot(&self.probe_in_flight))
    }

    async fn reset_timeout_elapsed(&self) -> bool {
        match self.store.opened_at().await {
            Some(opened_at) => (Utc::now() - opened_at)
                .to_std()
                .map(|elapsed| elapsed >= self.config.reset_timeout)
                .unwrap_or(false),
            None => {
                warn!(breaker = %self.name, "Circuit open but no timestamp recorded");
                true
            }
        }
    }

    async fn handle_success(&self, probing: bool) {
        self.store.reset_counter().await;
        for listener in &self.listeners {
            listener.on_success(&self.name);
        }
        if probing {
            self.transition(CircuitState::HalfOpen, CircuitState::Closed)
                .await;
        }
    }

    async fn handle_failure(&self, probing: bool, error: &E) {
        for listener in &self.listeners {
            listener.on_failure(&self.name, error);
        }

        if probing {
            self.trip(CircuitState::HalfOpen).await;
            return;
        }

        if let Some(count) = self.store.increment_counter().await {
            if count >= self.config.fail_max {
                self.trip(CircuitState::Closed).await;
            }
        }
    }

    async fn trip(&self, from: CircuitState) {
        self.store.set_opened_at(Utc::now()).await;
        self.transition(from, CircuitState::Open).await;
    }

    async fn transition(&self, from: CircuitState, to: CircuitState) {
        self.store.set_state(to).await;
        for listener in &self.listeners {
            listener.on_state_change(&self.name, from, to);
        }
    }

    /// Force the breaker open; calls are rejected until the reset timeout elapses
    pub async fn open(&self) {
        let from = self.store.state().await;
        warn!(breaker = %self.name, "🚨 Circuit breaker forced open");
        self.trip(from).await;
    }

    /// Force the breaker closed and clear its failure count
    pub async fn close(&self) {
        let from = self.store.state().await;
        warn!(breaker = %self.name, "🚨 Circuit breaker forced closed");
        self.store.reset_counter().await;
        self.transition(from, CircuitState::Closed).await;
    }

    /// Force the breaker half-open; the next call becomes a probe
    pub async fn half_open(&self) {
        let from = self.store.state().await;
        warn!(breaker = %self.name, "🚨 Circuit breaker forced half-open");
        self.transition(from, CircuitState::HalfOpen).await;
    }
}

fn cache_kind(cache: &CacheProvider) -> &'static str {
    if cache.is_distributed() {
        "distributed"
    } else {
        "process_local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheService;
    use crate::resilience::LoggingListener;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Default)]
    struct RecordingListener {
        transitions: Mutex<Vec<(CircuitState, CircuitState)>>,
        failures: AtomicUsize,
        ignored: AtomicUsize,
    }

    impl CircuitBreakerListener for RecordingListener {
        fn on_failure(&self, _breaker: &str, _error: &dyn fmt::Display) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }

        fn on_ignored(&self, _breaker: &str, _error: &dyn fmt::Display) {
            self.ignored.fetch_add(1, Ordering::SeqCst);
        }

        fn on_state_change(&self, _breaker: &str, from: CircuitState, to: CircuitState) {
            self.transitions.lock().push((from, to));
        }
    }

    fn breaker(
        cache: &MemoryCacheService,
        fail_max: u32,
        reset_timeout: Duration,
        listener: Arc<RecordingListener>,
    ) -> CircuitBreaker<String> {
        CircuitBreaker::new(
            "test".to_string(),
            CircuitBreakerConfig {
                fail_max,
                reset_timeout,
                fallback_state: CircuitState::Closed,
            },
            cache.clone().into(),
            "breaker",
            Duration::from_millis(100),
            Arc::new(|e: &String| e.starts_with("expected")),
            vec![
                listener as Arc<dyn CircuitBreakerListener>,
                Arc::new(LoggingListener),
            ],
        )
    }

    #[tokio::test]
    async fn test_circuit_breaker_normal_operation() {
        let cache = MemoryCacheService::new();
        let circuit = breaker(&cache, 3, Duration::from_secs(1), Arc::default());

        assert_eq!(circuit.current_state().await, CircuitState::Closed);
        let result = circuit.call(|| async { Ok::<_, String>("success") }).await;
        assert_eq!(result.unwrap(), "success");
        assert_eq!(circuit.fail_counter().await, 0);
    }

    #[tokio::test]
    async fn test_opens_after_fail_max_and_rejects_without_invoking() {
        let cache = MemoryCacheService::new();
        let listener = Arc::new(RecordingListener::default());
        let circuit = breaker(&cache, 2, Duration::from_secs(60), listener.clone());

        let first = circuit
            .call(|| async { Err::<(), _>("expected: down".to_string()) })
            .await;
        assert!(matches!(first, Err(CircuitBreakerError::OperationFailed(_))));
        assert_eq!(circuit.current_state().await, CircuitState::Closed);

        let second = circuit
            .call(|| async { Err::<(), _>("expected: down".to_string()) })
            .await;
        assert!(matches!(second, Err(CircuitBreakerError::OperationFailed(_))));
        assert_eq!(circuit.current_state().await, CircuitState::Open);

        let invoked = AtomicUsize::new(0);
        let rejected = circuit
            .call(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(())
            })
            .await;
        assert!(matches!(rejected, Err(CircuitBreakerError::CircuitOpen { .. })));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);

        assert_eq!(listener.failures.load(Ordering::SeqCst), 2);
        assert_eq!(
            listener.transitions.lock().as_slice(),
            &[(CircuitState::Closed, CircuitState::Open)]
        );
    }

    #[tokio::test]
    async fn test_unexpected_errors_do_not_count() {
        let cache = MemoryCacheService::new();
        let listener = Arc::new(RecordingListener::default());
        let circuit = breaker(&cache, 1, Duration::from_secs(60), listener.clone());

        for _ in 0..3 {
            let result = circuit
                .call(|| async { Err::<(), _>("validation failed".to_string()) })
                .await;
            assert_eq!(
                result.unwrap_err().into_operation_error().as_deref(),
                Some("validation failed")
            );
        }
        assert_eq!(circuit.current_state().await, CircuitState::Closed);
        assert_eq!(circuit.fail_counter().await, 0);
        assert_eq!(listener.ignored.load(Ordering::SeqCst), 3);
        assert_eq!(listener.failures.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_resets_failure_counter() {
        let cache = MemoryCacheService::new();
        let circuit = breaker(&cache, 3, Duration::from_secs(60), Arc::default());

        let _ = circuit
            .call(|| async { Err::<(), _>("expected".to_string()) })
            .await;
        assert_eq!(circuit.fail_counter().await, 1);
        let _ = circuit.call(|| async { Ok::<_, String>(()) }).await;
        assert_eq!(circuit.fail_counter().await, 0);
    }

    #[tokio::test]
    async fn test_half_open_probe_success_closes() {
        let cache = MemoryCacheService::new();
        let circuit = breaker(&cache, 1, Duration::from_millis(50), Arc::default());

        let _ = circuit
            .call(|| async { Err::<(), _>("expected".to_string()) })
            .await;
        assert_eq!(circuit.current_state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(80)).await;

        let result = circuit.call(|| async { Ok::<_, String>("probe") }).await;
        assert!(result.is_ok());
        assert_eq!(circuit.current_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_probe_failure_reopens() {
        let cache = MemoryCacheService::new();
        let listener = Arc::new(RecordingListener::default());
        let circuit = breaker(&cache, 1, Duration::from_millis(50), listener.clone());

        let _ = circuit
            .call(|| async { Err::<(), _>("expected".to_string()) })
            .await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        let _ = circuit
            .call(|| async { Err::<(), _>("expected".to_string()) })
            .await;

        assert_eq!(circuit.current_state().await, CircuitState::Open);
        assert_eq!(
            listener.transitions.lock().as_slice(),
            &[
                (CircuitState::Closed, CircuitState::Open),
                (CircuitState::Open, CircuitState::HalfOpen),
                (CircuitState::HalfOpen, CircuitState::Open),
            ]
        );
    }

    #[tokio::test]
    async fn test_cancelled_probe_releases_slot() {
        let cache = MemoryCacheService::new();
        let circuit = breaker(&cache, 1, Duration::from_millis(50), Arc::default());

        let _ = circuit
            .call(|| async { Err::<(), _>("expected".to_string()) })
            .await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            circuit.call(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, String>(())
            }),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(circuit.current_state().await, CircuitState::HalfOpen);

        let result = circuit.call(|| async { Ok::<_, String>("recovered") }).await;
        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(circuit.current_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_probe_slot_is_exclusive_while_in_flight() {
        let cache = MemoryCacheService::new();
        let circuit = breaker(&cache, 1, Duration::from_millis(50), Arc::default());
        circuit.half_open().await;

        let slot = circuit.try_begin_probe();
        assert!(slot.is_some());
        let rejected = circuit.call(|| async { Ok::<_, String>(()) }).await;
        assert!(rejected.unwrap_err().is_circuit_open());

        drop(slot);
        assert!(circuit.call(|| async { Ok::<_, String>(()) }).await.is_ok());
    }

    #[tokio::test]
    async fn test_manual_close_allows_calls() {
        let cache = MemoryCacheService::new();
        let circuit = breaker(&cache, 1, Duration::from_secs(60), Arc::default());

        circuit.open().await;
        assert_eq!(circuit.current_state().await, CircuitState::Open);
        let rejected = circuit.call(|| async { Ok::<_, String>(()) }).await;
        assert!(rejected.unwrap_err().is_circuit_open());

        circuit.close().await;
        assert_eq!(circuit.current_state().await, CircuitState::Closed);
        let result = circuit.call(|| async { Ok::<_, String>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_cache_outage_falls_back_and_never_raises() {
        let cache = MemoryCacheService::new();
        let circuit = breaker(&cache, 1, Duration::from_secs(60), Arc::default());
        cache.set_available(false);

        assert_eq!(circuit.current_state().await, CircuitState::Closed);
        for _ in 0..3 {
            let result = circuit
                .call(|| async { Err::<(), _>("expected".to_string()) })
                .await;
            assert!(matches!(result, Err(CircuitBreakerError::OperationFailed(_))));
        }
        let result = circuit.call(|| async { Ok::<_, String>("through") }).await;
        assert_eq!(result.unwrap(), "through");
    }

    #[tokio::test]
    async fn test_state_is_shared_through_the_cache() {
        let cache = MemoryCacheService::new();
        let process_a = breaker(&cache, 1, Duration::from_secs(60), Arc::default());
        let process_b = breaker(&cache, 1, Duration::from_secs(60), Arc::default());

        let _ = process_a
            .call(|| async { Err::<(), _>("expected".to_string()) })
            .await;
        let rejected = process_b.call(|| async { Ok::<_, String>(()) }).await;
        assert!(rejected.unwrap_err().is_circuit_open());
    }

    #[test]
    fn test_state_string_forms() {
        for state in [CircuitState::Closed, CircuitState::Open, CircuitState::HalfOpen] {
            assert_eq!(state.as_str().parse::<CircuitState>().unwrap(), state);
        }
        assert!("sideways".parse::<CircuitState>().is_err());
    }
}
