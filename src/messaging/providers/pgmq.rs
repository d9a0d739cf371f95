//! # PostgreSQL Message Queue Provider (pgmq-rs)
//!
//! Default transport. Shares the tracking datastore's pool. Acknowledgment
//! is `pgmq.delete`.

use crate::messaging::errors::{MessagingError, MessagingResult};
use crate::messaging::service::MessagingService;
use crate::messaging::types::{Delivery, DeliveryInfo, MessageId, ReceiptHandle, TransportKind};
use async_trait::async_trait;
use ::pgmq::{types::Message, PGMQueue};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct PgmqMessagingService {
    pgmq: PGMQueue,
}

impl PgmqMessagingService {
    /// Create new pgmq client using existing connection pool (BYOP - Bring Your Own Pool)
    pub async fn new_with_pool(pool: sqlx::PgPool) -> Self {
        let pgmq = PGMQueue::new_with_pool(pool).await;
        info!("✅ pgmq messaging service created with shared pool");
        Self { pgmq }
    }

    fn visibility_seconds(visibility_timeout: Duration) -> i32 {
        i32::try_from(visibility_timeout.as_secs()).unwrap_or(i32::MAX)
    }
}

#[async_trait]
impl MessagingService for PgmqMessagingService {
    async fn ensure_queue(&self, queue_name: &str) -> MessagingResult<()> {
        self.pgmq.create(queue_name).await.map_err(|e| {
            MessagingError::queue_operation(queue_name, "create", e.to_string())
        })?;
        debug!(queue = %queue_name, "📋 Queue ensured");
        Ok(())
    }

    async fn send_message(&self, queue_name: &str, payload: &Value) -> MessagingResult<MessageId> {
        let message_id = self.pgmq.send(queue_name, payload).await?;
        debug!(queue = %queue_name, message_id = message_id, "📤 Message sent");
        Ok(MessageId::from(message_id))
    }

    async fn receive_messages(
        &self,
        queue_name: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> MessagingResult<Vec<Delivery>> {
        let limit = i32::try_from(max_messages).unwrap_or(i32::MAX);
        let messages: Vec<Message<Value>> = self
            .pgmq
            .read_batch(queue_name, Some(Self::visibility_seconds(visibility_timeout)), limit)
            .await?
            .unwrap_or_default();

        Ok(messages
            .into_iter()
            .map(|message| {
                let info = DeliveryInfo::new(queue_name, ReceiptHandle::from(message.msg_id))
                    .with_receive_count(u32::try_from(message.read_ct).unwrap_or(0))
                    .with_enqueued_at(message.enqueued_at);
                Delivery::new(message.message, info)
            })
            .collect())
    }

    async fn ack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> MessagingResult<()> {
        let message_id = receipt_handle.as_i64().ok_or_else(|| {
            MessagingError::queue_operation(
                queue_name,
                "delete",
                format!("receipt handle {receipt_handle} is not a pgmq message id"),
            )
        })?;
        self.pgmq.delete(queue_name, message_id).await?;
        debug!(queue = %queue_name, message_id = message_id, "🗑️ Message deleted");
        Ok(())
    }

    async fn health_check(&self) -> MessagingResult<bool> {
        sqlx::query("SELECT 1")
            .execute(&self.pgmq.connection)
            .await?;
        Ok(true)
    }

    fn transport_kind(&self) -> TransportKind {
        TransportKind::Pgmq
    }
}
