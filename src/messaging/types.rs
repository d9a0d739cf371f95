//! # Messaging Service Types
//!
//! Transport-neutral delivery types. Every delivery carries the metadata its
//! transport needs to acknowledge it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Broker transport in use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// PostgreSQL message queue
    Pgmq,
    /// Vendor queue; acknowledged by explicit delete-message only
    Sqs,
    /// Process-local queues for tests
    InMemory,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pgmq => "pgmq",
            Self::Sqs => "sqs",
            Self::InMemory => "in_memory",
        }
    }

    /// Whether the generic ack is ineffective and deliveries must be deleted explicitly
    pub fn requires_explicit_delete(&self) -> bool {
        matches!(self, Self::Sqs)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-assigned id of a sent message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for MessageId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for MessageId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Handle used to acknowledge a received message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(pub String);

impl ReceiptHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for ReceiptHandle {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for ReceiptHandle {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ReceiptHandle {
    fn from(handle: String) -> Self {
        Self(handle)
    }
}

impl From<&str> for ReceiptHandle {
    fn from(handle: &str) -> Self {
        Self(handle.to_string())
    }
}

/// Vendor queue acknowledgment metadata, present on every SQS delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqsDeliveryInfo {
    pub queue_url: String,
    pub receipt_handle: String,
}

/// Where a delivery came from and how to acknowledge it
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryInfo {
    pub queue: String,
    pub receipt_handle: ReceiptHandle,
    /// Delivery attempts, when the transport reports them
    pub receive_count: Option<u32>,
    pub enqueued_at: Option<DateTime<Utc>>,
    pub sqs: Option<SqsDeliveryInfo>,
}

impl DeliveryInfo {
    pub fn new(queue: impl Into<String>, receipt_handle: ReceiptHandle) -> Self {
        Self {
            queue: queue.into(),
            receipt_handle,
            receive_count: None,
            enqueued_at: None,
            sqs: None,
        }
    }

    pub fn with_receive_count(mut self, receive_count: u32) -> Self {
        self.receive_count = Some(receive_count);
        self
    }

    pub fn with_enqueued_at(mut self, enqueued_at: DateTime<Utc>) -> Self {
        self.enqueued_at = Some(enqueued_at);
        self
    }

    pub fn with_sqs(mut self, queue_url: impl Into<String>, receipt_handle: impl Into<String>) -> Self {
        self.sqs = Some(SqsDeliveryInfo {
            queue_url: queue_url.into(),
            receipt_handle: receipt_handle.into(),
        });
        self
    }
}

/// A received message with its payload still undecoded
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub payload: Value,
    pub info: DeliveryInfo,
}

impl Delivery {
    pub fn new(payload: Value, info: DeliveryInfo) -> Self {
        Self { payload, info }
    }
}
