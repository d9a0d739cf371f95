//! # Error Taxonomy
//!
//! Crate-level error plus the explicit classification consumers use to decide
//! whether a message is left for redelivery or acknowledged and dropped.

use crate::cache::CacheError;
use crate::config::ConfigurationError;
use crate::messaging::MessagingError;
use crate::models::StoreError;
use crate::resilience::CircuitBreakerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The message could not be interpreted
    #[error("Malformed {kind} message: {reason}")]
    MalformedMessage { kind: &'static str, reason: String },

    /// A result arrived for a task with no tracking row, after every lookup
    #[error("No tracking record for task {task_id} after {attempts} lookups")]
    OrphanedResult { task_id: String, attempts: u32 },

    /// The publish-path breaker rejected the call without contacting the broker
    #[error("Publishing is unavailable: circuit breaker {name} is open")]
    PublishUnavailable { name: String },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl TrackingError {
    pub fn malformed(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            kind,
            reason: reason.into(),
        }
    }

    /// True for the breaker-open condition, which callers may handle by degrading
    pub fn is_publish_unavailable(&self) -> bool {
        match self {
            Self::PublishUnavailable { .. } => true,
            Self::Messaging(MessagingError::CircuitBreakerOpen { .. }) => true,
            _ => false,
        }
    }
}

impl From<CircuitBreakerError<MessagingError>> for TrackingError {
    fn from(err: CircuitBreakerError<MessagingError>) -> Self {
        match err {
            CircuitBreakerError::CircuitOpen { name } => Self::PublishUnavailable { name },
            CircuitBreakerError::OperationFailed(inner) => Self::Messaging(inner),
            CircuitBreakerError::DuplicateName { name } => {
                Self::Configuration(ConfigurationError::Conflict(format!(
                    "circuit breaker name registered twice: {name}"
                )))
            }
        }
    }
}

impl From<serde_json::Error> for TrackingError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedMessage {
            kind: "json",
            reason: err.to_string(),
        }
    }
}

pub type TrackingResult<T> = Result<T, TrackingError>;

/// What a consumer does with the message after handling failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Leave unacknowledged; the transport redelivers after the visibility timeout
    Requeue,
    /// Log and acknowledge so the message cannot block the queue
    Drop,
}

impl ErrorDisposition {
    pub fn should_ack(self) -> bool {
        matches!(self, Self::Drop)
    }
}

/// Task consumer persistence failures: only connection loss is retried
pub fn classify_store_error(error: &StoreError) -> ErrorDisposition {
    match error {
        StoreError::ConnectionLost(_) => ErrorDisposition::Requeue,
        StoreError::NotFound { .. } | StoreError::Query { .. } | StoreError::Serialization(_) => {
            ErrorDisposition::Drop
        }
    }
}

/// Result consumer failures: every outcome is acknowledged
pub fn classify_result_error(_error: &TrackingError) -> ErrorDisposition {
    ErrorDisposition::Drop
}

/// Task consumer failures of any kind
pub fn classify_task_error(error: &TrackingError) -> ErrorDisposition {
    match error {
        TrackingError::Store(store_error) => classify_store_error(store_error),
        _ => ErrorDisposition::Drop,
    }
}
