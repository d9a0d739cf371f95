//! Cache error types

use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// Failed to connect to cache backend
    #[error("Cache connection error: {0}")]
    ConnectionError(String),

    /// Stored value could not be interpreted
    #[error("Cache serialization error: {0}")]
    SerializationError(String),

    /// Cache operation timed out
    #[error("Cache operation timed out: {0}")]
    Timeout(String),

    /// Generic backend error
    #[error("Cache backend error: {0}")]
    BackendError(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            CacheError::Timeout(err.to_string())
        } else if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
            CacheError::ConnectionError(err.to_string())
        } else if err.kind() == redis::ErrorKind::TypeError {
            CacheError::SerializationError(err.to_string())
        } else {
            CacheError::BackendError(err.to_string())
        }
    }
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
