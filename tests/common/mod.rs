//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tasker_tracking::cache::MemoryCacheService;
use tasker_tracking::config::TrackingConfig;
use tasker_tracking::messaging::{
    Delivery, InMemoryMessagingService, MessageId, MessagingResult, MessagingService,
    ReceiptHandle, TransportKind,
};
use tasker_tracking::models::{InMemoryTaskStore, TaskStore};
use tasker_tracking::TrackingSystem;

const QUEUE_URL_BASE: &str = "https://sqs.test.local/000000000000/";

/// Transport double that records every acknowledgment call.
///
/// Behaves like the given transport kind. As `Sqs`, deliveries carry a queue
/// URL and receipt handle, and the generic ack is recorded but has no effect.
#[derive(Debug)]
pub struct RecordingMessagingService {
    inner: InMemoryMessagingService,
    kind: TransportKind,
    acks: Mutex<Vec<(String, String)>>,
    deletes: Mutex<Vec<(String, String)>>,
}

impl RecordingMessagingService {
    pub fn new(kind: TransportKind) -> Self {
        Self {
            inner: InMemoryMessagingService::new(),
            kind,
            acks: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_url(queue: &str) -> String {
        format!("{QUEUE_URL_BASE}{queue}")
    }

    pub fn acks(&self) -> Vec<(String, String)> {
        self.acks.lock().clone()
    }

    pub fn deletes(&self) -> Vec<(String, String)> {
        self.deletes.lock().clone()
    }

    pub fn set_available(&self, available: bool) {
        self.inner.set_available(available);
    }

    pub async fn queue_length(&self, queue: &str) -> usize {
        self.inner.queue_length(queue).await
    }
}

#[async_trait]
impl MessagingService for RecordingMessagingService {
    async fn ensure_queue(&self, queue_name: &str) -> MessagingResult<()> {
        self.inner.ensure_queue(queue_name).await
    }

    async fn send_message(&self, queue_name: &str, payload: &Value) -> MessagingResult<MessageId> {
        self.inner.send_message(queue_name, payload).await
    }

    async fn receive_messages(
        &self,
        queue_name: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> MessagingResult<Vec<Delivery>> {
        let deliveries = self
            .inner
            .receive_messages(queue_name, max_messages, visibility_timeout)
            .await?;
        if self.kind != TransportKind::Sqs {
            return Ok(deliveries);
        }
        Ok(deliveries
            .into_iter()
            .map(|mut delivery| {
                let receipt = delivery.info.receipt_handle.to_string();
                delivery.info = delivery
                    .info
                    .with_sqs(Self::queue_url(queue_name), receipt);
                delivery
            })
            .collect())
    }

    async fn ack_message(&self, queue_name: &str, receipt_handle: &ReceiptHandle) -> MessagingResult<()> {
        self.acks
            .lock()
            .push((queue_name.to_string(), receipt_handle.to_string()));
        if self.kind == TransportKind::Sqs {
            return Ok(());
        }
        self.inner.ack_message(queue_name, receipt_handle).await
    }

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> MessagingResult<()> {
        self.deletes
            .lock()
            .push((queue_url.to_string(), receipt_handle.to_string()));
        let queue = queue_url.trim_start_matches(QUEUE_URL_BASE);
        self.inner
            .ack_message(queue, &ReceiptHandle::from(receipt_handle))
            .await
    }

    async fn health_check(&self) -> MessagingResult<bool> {
        self.inner.health_check().await
    }

    fn transport_kind(&self) -> TransportKind {
        self.kind
    }
}

/// Configuration for fast tests: short lookup delays and polls
pub fn test_config() -> TrackingConfig {
    let mut config = TrackingConfig::default();
    config.messaging.poll_interval_ms = 5;
    config.result_consumer.missing_task_retries = 3;
    config.result_consumer.missing_task_delay_ms = 5;
    config.circuit_breaker.fail_max = 3;
    config
}

/// A system over an in-memory store, memory cache and the given transport
pub fn system_with(
    config: TrackingConfig,
    transport: Arc<dyn MessagingService>,
) -> (TrackingSystem, Arc<InMemoryTaskStore>) {
    let store = Arc::new(InMemoryTaskStore::new());
    let system = TrackingSystem::assemble(
        config,
        None,
        Arc::clone(&store) as Arc<dyn TaskStore>,
        MemoryCacheService::new().into(),
        transport,
    )
    .expect("test system assembles");
    (system, store)
}

pub fn task_envelope(id: &str, task: &str) -> Value {
    json!({
        "headers": {
            "id": id,
            "task": task,
            "retries": 0,
            "eta": null,
            "expires": null,
            "timelimit": [null, null]
        },
        "body": {"args": [], "kwargs": {}}
    })
}

pub fn result_envelope(task_id: &str, status: &str, result: Value) -> Value {
    json!({"task_id": task_id, "status": status, "result": result})
}
