//! # Vendor Queue Provider (Amazon SQS)
//!
//! The generic acknowledgment does not remove an SQS message; only an
//! explicit `DeleteMessage` with the queue URL and receipt handle does. Every
//! delivery therefore carries [`SqsDeliveryInfo`](crate::messaging::SqsDeliveryInfo)
//! and `ack_message` is refused so a caller cannot silently leave the
//! message to reappear after the visibility timeout.

use crate::config::SqsConfig;
use crate::messaging::errors::{MessagingError, MessagingResult};
use crate::messaging::service::MessagingService;
use crate::messaging::types::{Delivery, DeliveryInfo, MessageId, ReceiptHandle, TransportKind};
use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::config::Region;
use aws_sdk_sqs::error::{DisplayErrorContext, SdkError};
use aws_sdk_sqs::Client;
use dashmap::DashMap;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// SQS caps a single receive at ten messages
const MAX_RECEIVE_BATCH: usize = 10;

#[derive(Debug, Clone)]
pub struct SqsMessagingService {
    client: Client,
    config: SqsConfig,
    queue_urls: DashMap<String, String>,
}

impl SqsMessagingService {
    /// Build a client from the ambient AWS configuration plus overrides
    pub async fn from_config(config: &SqsConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).timeout_config(
            TimeoutConfig::builder()
                .operation_timeout(config.operation_timeout())
                .build(),
        );
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        info!(
            region = ?sdk_config.region().map(|r| r.as_ref().to_string()),
            endpoint = ?config.endpoint_url,
            "✅ SQS messaging service created"
        );
        Self::with_client(Client::new(&sdk_config), config.clone())
    }

    pub fn with_client(client: Client, config: SqsConfig) -> Self {
        Self {
            client,
            config,
            queue_urls: DashMap::new(),
        }
    }

    /// Resolve a queue name to its URL, from the prefix, the cache, or `GetQueueUrl`
    async fn queue_url(&self, queue_name: &str) -> MessagingResult<String> {
        if let Some(prefix) = &self.config.queue_url_prefix {
            return Ok(format!("{}/{}", prefix.trim_end_matches('/'), queue_name));
        }
        if let Some(url) = self.queue_urls.get(queue_name) {
            return Ok(url.clone());
        }

        let output = self
            .client
            .get_queue_url()
            .queue_name(queue_name)
            .send()
            .await
            .map_err(|err| {
                let missing = err
                    .as_service_error()
                    .map(|e| e.is_queue_does_not_exist())
                    .unwrap_or(false);
                if missing {
                    MessagingError::queue_not_found(queue_name)
                } else {
                    self.sdk_error(queue_name, "get_queue_url", err)
                }
            })?;

        let url = output
            .queue_url()
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?
            .to_string();
        self.queue_urls.insert(queue_name.to_string(), url.clone());
        Ok(url)
    }

    fn sdk_error<E, R>(&self, queue_name: &str, operation: &str, err: SdkError<E, R>) -> MessagingError
    where
        E: std::error::Error + Send + Sync + 'static,
        R: std::fmt::Debug,
    {
        match &err {
            SdkError::TimeoutError(_) => MessagingError::timeout(
                format!("sqs {operation} on {queue_name}"),
                self.config.operation_timeout_seconds,
            ),
            SdkError::DispatchFailure(_) => {
                MessagingError::connection(format!("sqs {operation}: {}", DisplayErrorContext(&err)))
            }
            _ => MessagingError::queue_operation(
                queue_name,
                operation,
                DisplayErrorContext(&err).to_string(),
            ),
        }
    }
}

#[async_trait]
impl MessagingService for SqsMessagingService {
    async fn ensure_queue(&self, queue_name: &str) -> MessagingResult<()> {
        let output = self
            .client
            .create_queue()
            .queue_name(queue_name)
            .send()
            .await
            .map_err(|e| self.sdk_error(queue_name, "create_queue", e))?;
        if let Some(url) = output.queue_url() {
            self.queue_urls.insert(queue_name.to_string(), url.to_string());
        }
        debug!(queue = %queue_name, "📋 SQS queue ensured");
        Ok(())
    }

    async fn send_message(&self, queue_name: &str, payload: &Value) -> MessagingResult<MessageId> {
        let queue_url = self.queue_url(queue_name).await?;
        let body = serde_json::to_string(payload)?;
        let output = self
            .client
            .send_message()
            .queue_url(&queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| self.sdk_error(queue_name, "send_message", e))?;

        let message_id = output.message_id().unwrap_or_default().to_string();
        debug!(queue = %queue_name, message_id = %message_id, "📤 SQS message sent");
        Ok(MessageId::from(message_id))
    }

    async fn receive_messages(
        &self,
        queue_name: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> MessagingResult<Vec<Delivery>> {
        let queue_url = self.queue_url(queue_name).await?;
        let batch = max_messages.clamp(1, MAX_RECEIVE_BATCH);
        let output = self
            .client
            .receive_message()
            .queue_url(&queue_url)
            .max_number_of_messages(i32::try_from(batch).unwrap_or(1))
            .visibility_timeout(i32::try_from(visibility_timeout.as_secs()).unwrap_or(i32::MAX))
            .wait_time_seconds(self.config.wait_time_seconds)
            .send()
            .await
            .map_err(|e| self.sdk_error(queue_name, "receive_message", e))?;

        let mut deliveries = Vec::new();
        for message in output.messages() {
            let Some(receipt_handle) = message.receipt_handle() else {
                warn!(queue = %queue_name, "SQS message without receipt handle skipped");
                continue;
            };
            let payload = match message.body().map(serde_json::from_str::<Value>) {
                Some(Ok(value)) => value,
                Some(Err(e)) => {
                    warn!(queue = %queue_name, error = %e, "SQS message body is not JSON, passing as string");
                    Value::String(message.body().unwrap_or_default().to_string())
                }
                None => Value::Null,
            };
            let info = DeliveryInfo::new(queue_name, ReceiptHandle::new(receipt_handle))
                .with_sqs(&queue_url, receipt_handle);
            deliveries.push(Delivery::new(payload, info));
        }
        Ok(deliveries)
    }

    async fn ack_message(
        &self,
        _queue_name: &str,
        _receipt_handle: &ReceiptHandle,
    ) -> MessagingResult<()> {
        Err(MessagingError::unsupported(
            TransportKind::Sqs.as_str(),
            "ack_message (use delete_message with the delivery's queue URL and receipt handle)",
        ))
    }

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> MessagingResult<()> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| self.sdk_error(queue_url, "delete_message", e))?;
        debug!(queue_url = %queue_url, "🗑️ SQS message deleted");
        Ok(())
    }

    async fn health_check(&self) -> MessagingResult<bool> {
        self.client
            .list_queues()
            .max_results(1)
            .send()
            .await
            .map_err(|e| self.sdk_error("*", "list_queues", e))?;
        Ok(true)
    }

    fn transport_kind(&self) -> TransportKind {
        TransportKind::Sqs
    }
}
