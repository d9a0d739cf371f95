//! # Guarded Send Path
//!
//! The transport's send primitive wrapped by the publish-path circuit breaker.
//! Queue declaration runs inside the same guard, once per queue per process,
//! before the first send that needs it.

use super::errors::{MessagingError, MessagingErrorKind};
use super::service::MessagingService;
use super::types::MessageId;
use crate::config::CircuitBreakerSettings;
use crate::error::TrackingResult;
use crate::resilience::{CircuitBreaker, CircuitBreakerRegistry, ErrorPredicate};
use dashmap::DashSet;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Breaker predicate counting the configured transport error kinds.
/// `CircuitOpen` is always counted.
pub fn expected_messaging_errors(kinds: &[MessagingErrorKind]) -> ErrorPredicate<MessagingError> {
    let mut kinds = kinds.to_vec();
    if !kinds.contains(&MessagingErrorKind::CircuitOpen) {
        kinds.push(MessagingErrorKind::CircuitOpen);
    }
    Arc::new(move |error: &MessagingError| kinds.contains(&error.kind()))
}

#[derive(Debug)]
pub struct GuardedSender {
    transport: Arc<dyn MessagingService>,
    breaker: Arc<CircuitBreaker<MessagingError>>,
    topology: Vec<String>,
    declared: DashSet<String>,
}

impl GuardedSender {
    pub fn new(
        transport: Arc<dyn MessagingService>,
        breaker: Arc<CircuitBreaker<MessagingError>>,
        topology: Vec<String>,
    ) -> Self {
        Self {
            transport,
            breaker,
            topology,
            declared: DashSet::new(),
        }
    }

    /// Register the publish breaker described by `settings` and wrap `transport` with it
    pub fn from_settings(
        transport: Arc<dyn MessagingService>,
        registry: &CircuitBreakerRegistry<MessagingError>,
        settings: &CircuitBreakerSettings,
        topology: Vec<String>,
    ) -> TrackingResult<Self> {
        let breaker = registry.register(
            settings.name.clone(),
            settings.to_resilience_config(),
            expected_messaging_errors(&settings.expected_errors),
        )?;
        info!(
            breaker = %settings.name,
            transport = %transport.transport_kind(),
            queues = topology.len(),
            "🛡️ Guarded send path ready"
        );
        Ok(Self::new(transport, breaker, topology))
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker<MessagingError>> {
        &self.breaker
    }

    pub fn transport(&self) -> &Arc<dyn MessagingService> {
        &self.transport
    }

    /// Transmit `payload` to `queue` through the breaker.
    ///
    /// Fails with `TrackingError::PublishUnavailable` while the breaker is open.
    pub async fn send(&self, queue: &str, payload: &Value) -> TrackingResult<MessageId> {
        let message_id = self
            .breaker
            .call(|| async {
                self.declare(queue).await?;
                self.transport.send_message(queue, payload).await
            })
            .await?;
        debug!(queue = %queue, message_id = %message_id, "📤 Published");
        Ok(message_id)
    }

    /// Declare the configured topology now rather than on first send
    pub async fn declare_topology(&self) -> TrackingResult<()> {
        self.breaker
            .call(|| async { self.declare_all().await })
            .await?;
        Ok(())
    }

    async fn declare(&self, queue: &str) -> Result<(), MessagingError> {
        self.declare_all().await?;
        self.declare_one(queue).await
    }

    async fn declare_all(&self) -> Result<(), MessagingError> {
        for queue in &self.topology {
            self.declare_one(queue).await?;
        }
        Ok(())
    }

    async fn declare_one(&self, queue: &str) -> Result<(), MessagingError> {
        if self.declared.contains(queue) {
            return Ok(());
        }
        self.transport.ensure_queue(queue).await?;
        self.declared.insert(queue.to_string());
        debug!(queue = %queue, "📋 Queue declared");
        Ok(())
    }
}
