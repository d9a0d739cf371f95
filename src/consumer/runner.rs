//! Receive loop shared by the consumers

use super::ack::acknowledge;
use crate::error::ErrorDisposition;
use crate::messaging::{Delivery, MessagingResult, MessagingService};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// What happens to a delivery once its handler returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Ack,
    /// Left unacknowledged; redelivered after the visibility timeout
    Leave,
}

impl From<ErrorDisposition> for Settlement {
    fn from(disposition: ErrorDisposition) -> Self {
        match disposition {
            ErrorDisposition::Requeue => Self::Leave,
            ErrorDisposition::Drop => Self::Ack,
        }
    }
}

/// Per-message logic of a consumer. Never fails: every outcome is a settlement.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, delivery: &Delivery) -> Settlement;
}

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub queues: Vec<String>,
    pub batch_size: usize,
    pub visibility_timeout: Duration,
    pub poll_interval: Duration,
}

/// Polls `queues` one delivery at a time and settles each through the transport
pub struct ConsumerLoop<H> {
    transport: Arc<dyn MessagingService>,
    handler: H,
    settings: LoopSettings,
}

impl<H: DeliveryHandler> ConsumerLoop<H> {
    pub fn new(transport: Arc<dyn MessagingService>, handler: H, settings: LoopSettings) -> Self {
        Self {
            transport,
            handler,
            settings,
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Run until `shutdown` flips to true or its sender is dropped
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            consumer = self.handler.name(),
            transport = %self.transport.transport_kind(),
            queues = ?self.settings.queues,
            "🚀 Starting consumer loop"
        );

        while !*shutdown.borrow() {
            let processed = match self.poll_once().await {
                Ok(processed) => processed,
                Err(e) => {
                    error!(consumer = self.handler.name(), error = %e, "Error receiving messages");
                    0
                }
            };
            if processed > 0 {
                continue;
            }
            tokio::select! {
                _ = sleep(self.settings.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(consumer = self.handler.name(), "🛑 Consumer loop stopped");
    }

    /// Receive one batch from every queue and settle it. Returns deliveries handled.
    ///
    /// A queue that fails to receive is logged and skipped for this cycle; the
    /// error is returned only when every queue failed.
    #[instrument(skip(self), fields(consumer = self.handler.name()))]
    pub async fn poll_once(&self) -> MessagingResult<usize> {
        let mut processed = 0;
        let mut last_error = None;
        let mut failed = 0;
        for queue in &self.settings.queues {
            let deliveries = match self
                .transport
                .receive_messages(queue, self.settings.batch_size, self.settings.visibility_timeout)
                .await
            {
                Ok(deliveries) => deliveries,
                Err(e) => {
                    warn!(queue = %queue, error = %e, "Receive failed, skipping queue this cycle");
                    failed += 1;
                    last_error = Some(e);
                    continue;
                }
            };

            for delivery in deliveries {
                self.settle(&delivery).await;
                processed += 1;
            }
        }

        match last_error {
            Some(e) if failed == self.settings.queues.len() => Err(e),
            _ => Ok(processed),
        }
    }

    async fn settle(&self, delivery: &Delivery) {
        let info = &delivery.info;
        match self.handler.handle(delivery).await {
            Settlement::Ack => {
                if let Err(e) = acknowledge(self.transport.as_ref(), info).await {
                    warn!(
                        queue = %info.queue,
                        receipt = %info.receipt_handle,
                        error = %e,
                        "Failed to acknowledge processed message"
                    );
                }
            }
            Settlement::Leave => {
                debug!(
                    queue = %info.queue,
                    receipt = %info.receipt_handle,
                    "Message left for redelivery"
                );
            }
        }
    }
}
