//! In-memory messaging provider
//!
//! Per-queue `VecDeque` with visibility timeout simulation. For tests and
//! single-process development. An availability switch makes every operation
//! fail with a connection error to simulate a broker outage.

use crate::messaging::errors::{MessagingError, MessagingResult};
use crate::messaging::service::MessagingService;
use crate::messaging::types::{Delivery, DeliveryInfo, MessageId, ReceiptHandle, TransportKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// In-memory message with visibility tracking
#[derive(Debug, Clone)]
struct InMemoryQueuedMessage {
    id: u64,
    payload: Value,
    enqueued_at: DateTime<Utc>,
    /// When the message becomes visible again (None = visible now)
    visible_at: Option<DateTime<Utc>>,
    receive_count: u32,
}

#[derive(Debug, Default)]
struct InMemoryQueue {
    messages: VecDeque<InMemoryQueuedMessage>,
}

#[derive(Debug)]
pub struct InMemoryMessagingService {
    queues: RwLock<HashMap<String, InMemoryQueue>>,
    next_id: AtomicU64,
    available: AtomicBool,
}

impl Default for InMemoryMessagingService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMessagingService {
    pub fn new() -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            available: AtomicBool::new(true),
        }
    }

    /// Create with pre-initialized queues
    pub fn with_queues(queue_names: &[&str]) -> Self {
        let queues = queue_names
            .iter()
            .map(|name| (name.to_string(), InMemoryQueue::default()))
            .collect();
        Self {
            queues: RwLock::new(queues),
            next_id: AtomicU64::new(1),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate a broker outage (or recovery)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Messages in the queue, visible or not
    pub async fn queue_length(&self, queue_name: &str) -> usize {
        self.queues
            .read()
            .await
            .get(queue_name)
            .map(|q| q.messages.len())
            .unwrap_or(0)
    }

    fn ensure_available(&self) -> MessagingResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MessagingError::connection("in-memory broker marked unavailable"))
        }
    }
}

#[async_trait]
impl MessagingService for InMemoryMessagingService {
    async fn ensure_queue(&self, queue_name: &str) -> MessagingResult<()> {
        self.ensure_available()?;
        self.queues
            .write()
            .await
            .entry(queue_name.to_string())
            .or_default();
        Ok(())
    }

    async fn send_message(&self, queue_name: &str, payload: &Value) -> MessagingResult<MessageId> {
        self.ensure_available()?;
        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        queue.messages.push_back(InMemoryQueuedMessage {
            id,
            payload: payload.clone(),
            enqueued_at: Utc::now(),
            visible_at: None,
            receive_count: 0,
        });
        Ok(MessageId::from(id))
    }

    async fn receive_messages(
        &self,
        queue_name: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> MessagingResult<Vec<Delivery>> {
        self.ensure_available()?;
        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let now = Utc::now();
        let visible_until = chrono::Duration::from_std(visibility_timeout)
            .map(|timeout| now + timeout)
            .map_err(|e| MessagingError::configuration("visibility_timeout", e.to_string()))?;

        let mut received = Vec::new();
        for msg in queue.messages.iter_mut() {
            if received.len() >= max_messages {
                break;
            }
            let is_visible = msg.visible_at.map(|vt| vt <= now).unwrap_or(true);
            if is_visible {
                msg.visible_at = Some(visible_until);
                msg.receive_count += 1;
                let info = DeliveryInfo::new(queue_name, ReceiptHandle::from(msg.id))
                    .with_receive_count(msg.receive_count)
                    .with_enqueued_at(msg.enqueued_at);
                received.push(Delivery::new(msg.payload.clone(), info));
            }
        }
        Ok(received)
    }

    async fn ack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> MessagingResult<()> {
        self.ensure_available()?;
        let message_id = receipt_handle.as_str().parse::<u64>().map_err(|_| {
            MessagingError::queue_operation(queue_name, "ack", "invalid receipt handle")
        })?;

        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        match queue.messages.iter().position(|m| m.id == message_id) {
            Some(pos) => {
                queue.messages.remove(pos);
                Ok(())
            }
            None => Err(MessagingError::queue_operation(
                queue_name,
                "ack",
                format!("message {message_id} not found"),
            )),
        }
    }

    async fn health_check(&self) -> MessagingResult<bool> {
        Ok(self.available.load(Ordering::SeqCst))
    }

    fn transport_kind(&self) -> TransportKind {
        TransportKind::InMemory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_send_and_receive() {
        let service = InMemoryMessagingService::new();
        service.ensure_queue("test_queue").await.unwrap();
        service
            .send_message("test_queue", &json!({"key": "value"}))
            .await
            .unwrap();

        let messages = service
            .receive_messages("test_queue", 10, Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].payload, json!({"key": "value"}));
        assert_eq!(messages[0].info.receive_count, Some(1));
        assert!(messages[0].info.sqs.is_none());
    }

    #[tokio::test]
    async fn test_visibility_timeout_hides_then_redelivers() {
        let service = InMemoryMessagingService::with_queues(&["q"]);
        service.send_message("q", &json!(1)).await.unwrap();

        let first = service
            .receive_messages("q", 10, Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(first.len(), 1);
        assert!(service
            .receive_messages("q", 10, Duration::from_millis(50))
            .await
            .unwrap()
            .is_empty());

        tokio::time::sleep(Duration::from_millis(80)).await;
        let again = service
            .receive_messages("q", 10, Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(again[0].info.receive_count, Some(2));
    }

    #[tokio::test]
    async fn test_ack_removes_message() {
        let service = InMemoryMessagingService::with_queues(&["q"]);
        service.send_message("q", &json!(1)).await.unwrap();
        let delivery = service
            .receive_messages("q", 1, Duration::from_secs(30))
            .await
            .unwrap()
            .remove(0);
        service
            .ack_message("q", &delivery.info.receipt_handle)
            .await
            .unwrap();
        assert_eq!(service.queue_length("q").await, 0);
    }

    #[tokio::test]
    async fn test_outage_and_unknown_queue() {
        let service = InMemoryMessagingService::new();
        assert!(matches!(
            service.send_message("missing", &json!(1)).await,
            Err(MessagingError::QueueNotFound { .. })
        ));

        service.set_available(false);
        let err = service.ensure_queue("q").await.unwrap_err();
        assert!(err.is_transient());
        assert!(service.delete_message("url", "handle").await.is_err());
    }
}
