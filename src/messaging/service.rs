//! # Messaging Service Trait
//!
//! Provider-agnostic queue operations. Payloads are JSON values so the trait
//! stays object-safe and consumers can hold an `Arc<dyn MessagingService>`.

use super::errors::{MessagingError, MessagingResult};
use super::types::{Delivery, MessageId, ReceiptHandle, TransportKind};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

#[async_trait]
pub trait MessagingService: Send + Sync + std::fmt::Debug {
    /// Create a queue if it doesn't exist (idempotent)
    async fn ensure_queue(&self, queue_name: &str) -> MessagingResult<()>;

    /// Send a message to a queue, returning the provider's id for it
    async fn send_message(&self, queue_name: &str, payload: &Value) -> MessagingResult<MessageId>;

    /// Receive up to `max_messages`, hiding them from other consumers for `visibility_timeout`
    async fn receive_messages(
        &self,
        queue_name: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> MessagingResult<Vec<Delivery>>;

    /// Generic acknowledgment: remove a processed message from its queue
    async fn ack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> MessagingResult<()>;

    /// Explicit delete by queue URL and receipt handle (vendor queue acknowledgment)
    async fn delete_message(&self, _queue_url: &str, _receipt_handle: &str) -> MessagingResult<()> {
        Err(MessagingError::unsupported(
            self.transport_kind().as_str(),
            "delete_message",
        ))
    }

    async fn health_check(&self) -> MessagingResult<bool>;

    fn transport_kind(&self) -> TransportKind;

    fn provider_name(&self) -> &'static str {
        self.transport_kind().as_str()
    }
}
