//! Transport-specific acknowledgment

use crate::messaging::{DeliveryInfo, MessagingError, MessagingResult, MessagingService};

/// Remove a processed delivery from its queue.
///
/// The vendor queue's generic ack has no effect, so its deliveries are
/// removed by an explicit delete using the queue URL and receipt handle from
/// the delivery metadata. Every other transport uses the generic ack.
pub async fn acknowledge(transport: &dyn MessagingService, info: &DeliveryInfo) -> MessagingResult<()> {
    if !transport.transport_kind().requires_explicit_delete() {
        return transport.ack_message(&info.queue, &info.receipt_handle).await;
    }

    let sqs = info.sqs.as_ref().ok_or_else(|| {
        MessagingError::internal(format!(
            "delivery {} from {} carries no queue URL and receipt handle",
            info.receipt_handle, info.queue
        ))
    })?;
    transport
        .delete_message(&sqs.queue_url, &sqs.receipt_handle)
        .await
}
