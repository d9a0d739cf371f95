//! # Messaging Error Types
//!
//! Structured transport errors plus a coarse [`MessagingErrorKind`] used to
//! decide which failures count toward the publish-path circuit breaker.

use crate::resilience::CircuitBreakerError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transport error kinds, configurable as "expected" breaker failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagingErrorKind {
    /// Broker unreachable or connection dropped
    Connection,
    /// Broker did not answer in time
    Timeout,
    /// Target queue does not exist
    QueueNotFound,
    /// Payload could not be encoded or decoded
    Serialization,
    /// The publish-path breaker rejected the call
    CircuitOpen,
    /// Operation not supported by the active transport
    Unsupported,
    /// Anything else
    Other,
}

/// Messaging error types
#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Broker connection error: {message}")]
    Connection { message: String },

    #[error("Network timeout: operation {operation} timed out after {timeout_seconds}s")]
    Timeout {
        operation: String,
        timeout_seconds: u64,
    },

    #[error("Queue operation failed: {queue_name}: {operation}: {message}")]
    QueueOperation {
        queue_name: String,
        operation: String,
        message: String,
    },

    #[error("Queue not found: {queue_name}")]
    QueueNotFound { queue_name: String },

    #[error("Message serialization error: {message}")]
    MessageSerialization { message: String },

    #[error("Message deserialization error: {message}")]
    MessageDeserialization { message: String },

    #[error("Circuit breaker is open for component: {component}")]
    CircuitBreakerOpen { component: String },

    #[error("Operation {operation} is not supported by the {transport} transport")]
    Unsupported {
        transport: String,
        operation: String,
    },

    #[error("Configuration error: {component}: {message}")]
    Configuration { component: String, message: String },

    #[error("Internal messaging error: {message}")]
    Internal { message: String },
}

impl MessagingError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout_seconds: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_seconds,
        }
    }

    pub fn queue_operation(
        queue_name: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::QueueOperation {
            queue_name: queue_name.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn queue_not_found(queue_name: impl Into<String>) -> Self {
        Self::QueueNotFound {
            queue_name: queue_name.into(),
        }
    }

    pub fn message_serialization(message: impl Into<String>) -> Self {
        Self::MessageSerialization {
            message: message.into(),
        }
    }

    pub fn message_deserialization(message: impl Into<String>) -> Self {
        Self::MessageDeserialization {
            message: message.into(),
        }
    }

    pub fn circuit_breaker_open(component: impl Into<String>) -> Self {
        Self::CircuitBreakerOpen {
            component: component.into(),
        }
    }

    pub fn unsupported(transport: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Unsupported {
            transport: transport.into(),
            operation: operation.into(),
        }
    }

    pub fn configuration(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Coarse classification of this error
    pub fn kind(&self) -> MessagingErrorKind {
        match self {
            Self::Connection { .. } => MessagingErrorKind::Connection,
            Self::Timeout { .. } => MessagingErrorKind::Timeout,
            Self::QueueNotFound { .. } => MessagingErrorKind::QueueNotFound,
            Self::MessageSerialization { .. } | Self::MessageDeserialization { .. } => {
                MessagingErrorKind::Serialization
            }
            Self::CircuitBreakerOpen { .. } => MessagingErrorKind::CircuitOpen,
            Self::Unsupported { .. } => MessagingErrorKind::Unsupported,
            Self::QueueOperation { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                MessagingErrorKind::Other
            }
        }
    }

    /// True for broker connectivity loss, the transient class of transport failure
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            MessagingErrorKind::Connection | MessagingErrorKind::Timeout
        )
    }
}

impl From<sqlx::Error> for MessagingError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => MessagingError::timeout("database_pool", 30),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => MessagingError::connection(err.to_string()),
            sqlx::Error::Configuration(config_err) => {
                MessagingError::configuration("database", config_err.to_string())
            }
            other => MessagingError::queue_operation("unknown", "sqlx", other.to_string()),
        }
    }
}

impl From<serde_json::Error> for MessagingError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() || err.is_data() || err.is_eof() {
            MessagingError::message_deserialization(err.to_string())
        } else {
            MessagingError::message_serialization(err.to_string())
        }
    }
}

impl From<pgmq::errors::PgmqError> for MessagingError {
    fn from(err: pgmq::errors::PgmqError) -> Self {
        match err {
            pgmq::errors::PgmqError::DatabaseError(db_err) => db_err.into(),
            other => MessagingError::queue_operation("unknown", "pgmq", other.to_string()),
        }
    }
}

impl From<CircuitBreakerError<MessagingError>> for MessagingError {
    fn from(err: CircuitBreakerError<MessagingError>) -> Self {
        match err {
            CircuitBreakerError::CircuitOpen { name } => MessagingError::circuit_breaker_open(name),
            CircuitBreakerError::OperationFailed(inner) => inner,
            CircuitBreakerError::DuplicateName { name } => MessagingError::configuration(
                "circuit_breaker",
                format!("duplicate breaker name {name}"),
            ),
        }
    }
}

pub type MessagingResult<T> = Result<T, MessagingError>;
