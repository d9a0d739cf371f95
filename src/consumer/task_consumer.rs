//! # Task Consumer
//!
//! Worker-side fallback that makes sure every consumed task has a tracking
//! row, even when it was published without going through the interceptor.
//!
//! Acknowledgment rules:
//! - row created, or already present: ack
//! - datastore connection lost: reset the connection, leave the message
//! - any other failure: log and ack, so a bad message cannot loop forever

use super::runner::{DeliveryHandler, Settlement};
use crate::error::{classify_task_error, ErrorDisposition, TrackingResult};
use crate::messaging::{Delivery, TaskMessage};
use crate::models::{CreateOutcome, NewTaskRecord, TaskStore};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct TaskConsumer {
    store: Arc<dyn TaskStore>,
}

impl TaskConsumer {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Decode a task envelope and create its row if absent
    pub async fn process(&self, payload: Value) -> TrackingResult<(String, CreateOutcome)> {
        let message = TaskMessage::from_value(payload)?;
        let task_id = message.id().to_string();
        let outcome = self.store.create_if_absent(record_for(message)).await?;
        Ok((task_id, outcome))
    }
}

/// Row for a consumed task: scheduling from its header properties, linkage
/// from its typed headers
pub fn record_for(message: TaskMessage) -> NewTaskRecord {
    let TaskMessage { headers, body } = message;
    let mut options = headers.scheduling_options();
    options.parent_id = headers.parent_id.clone();
    options.root_id = headers.root_id.clone();

    let mut record = NewTaskRecord::new(headers.id, headers.task, body)
        .with_options(options)
        .with_creator(headers.creator)
        .with_related_object(headers.related_object);
    record.parent_id = headers.parent_id;
    record.root_id = headers.root_id;
    record
}

#[async_trait]
impl DeliveryHandler for TaskConsumer {
    fn name(&self) -> &'static str {
        "task_consumer"
    }

    async fn handle(&self, delivery: &Delivery) -> Settlement {
        let queue = &delivery.info.queue;
        match self.process(delivery.payload.clone()).await {
            Ok((task_id, CreateOutcome::Created)) => {
                info!(task_id = %task_id, queue = %queue, "📝 Tracking row created at first consumption");
                Settlement::Ack
            }
            Ok((task_id, CreateOutcome::AlreadyExists)) => {
                debug!(task_id = %task_id, queue = %queue, "Task already tracked");
                Settlement::Ack
            }
            Err(e) => match classify_task_error(&e) {
                ErrorDisposition::Requeue => {
                    warn!(queue = %queue, error = %e, "💾 Datastore connection lost, message left for redelivery");
                    if let Err(reset_err) = self.store.reset_connection().await {
                        error!(error = %reset_err, "Failed to reset datastore connection");
                    }
                    Settlement::Leave
                }
                ErrorDisposition::Drop => {
                    error!(
                        queue = %queue,
                        receipt = %delivery.info.receipt_handle,
                        payload = %delivery.payload,
                        error = %e,
                        "Failed to track consumed task, acknowledging to keep the queue moving"
                    );
                    Settlement::Ack
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{DeliveryInfo, ReceiptHandle};
    use crate::models::{InMemoryTaskStore, StoreError};
    use serde_json::json;

    fn delivery(payload: Value) -> Delivery {
        Delivery::new(payload, DeliveryInfo::new("default", ReceiptHandle::from(1_i64)))
    }

    fn envelope(id: &str) -> Value {
        json!({
            "headers": {
                "id": id,
                "task": "exports.generate",
                "root_id": id,
                "retries": 3,
                "timelimit": [null, null]
            },
            "body": {"args": [42], "kwargs": {}}
        })
    }

    #[tokio::test]
    async fn test_creates_row_from_envelope() {
        let store = Arc::new(InMemoryTaskStore::new());
        let consumer = TaskConsumer::new(store.clone());

        assert_eq!(consumer.handle(&delivery(envelope("t1"))).await, Settlement::Ack);

        let record = store.find("t1").await.unwrap().unwrap();
        assert_eq!(record.task_type, "exports.generate");
        assert_eq!(record.input.args, vec![json!(42)]);
        assert_eq!(record.options.retries, Some(3));
        assert_eq!(record.options.timelimit, None);
        assert_eq!(record.root_id.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn test_redelivery_is_idempotent() {
        let store = Arc::new(InMemoryTaskStore::new());
        let consumer = TaskConsumer::new(store.clone());
        for _ in 0..3 {
            assert_eq!(consumer.handle(&delivery(envelope("t1"))).await, Settlement::Ack);
        }
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_connection_loss_leaves_message_and_resets() {
        let store = Arc::new(InMemoryTaskStore::new());
        store.inject_failure(StoreError::ConnectionLost("server closed the connection".into()));
        let consumer = TaskConsumer::new(store.clone());

        assert_eq!(consumer.handle(&delivery(envelope("t1"))).await, Settlement::Leave);
        assert_eq!(store.connection_resets(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_other_failures_are_acknowledged() {
        let store = Arc::new(InMemoryTaskStore::new());
        store.inject_failure(StoreError::query("insert", "value too long"));
        let consumer = TaskConsumer::new(store.clone());

        assert_eq!(consumer.handle(&delivery(envelope("t1"))).await, Settlement::Ack);
        assert_eq!(consumer.handle(&delivery(json!({"garbage": true}))).await, Settlement::Ack);
        assert_eq!(store.connection_resets(), 0);
    }
}
