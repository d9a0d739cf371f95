//! Task store error types

use thiserror::Error;

/// Errors raised by a [`TaskStore`](super::TaskStore) implementation
#[derive(Debug, Error)]
pub enum StoreError {
    /// The datastore connection was lost or never became usable.
    ///
    /// Work that hit this should be retried once the connection is reset.
    #[error("Datastore connection lost: {0}")]
    ConnectionLost(String),

    /// A row referenced by id does not exist
    #[error("Task record not found: {task_id}")]
    NotFound { task_id: String },

    /// The datastore rejected the statement (constraint, type, syntax)
    #[error("Datastore query failed: {operation}: {message}")]
    Query { operation: String, message: String },

    /// A stored JSON column could not be encoded or decoded
    #[error("Task record serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn query(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// True when the failure is a lost or unusable connection
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Protocol(_) => StoreError::ConnectionLost(err.to_string()),
            sqlx::Error::RowNotFound => StoreError::query("fetch", "No rows found"),
            sqlx::Error::Database(db_err) => StoreError::query("database", db_err.to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Serialization(err.to_string())
            }
            other => StoreError::query("sqlx", other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_class_errors_map_to_connection_lost() {
        assert!(StoreError::from(sqlx::Error::PoolTimedOut).is_connection_lost());
        assert!(StoreError::from(sqlx::Error::PoolClosed).is_connection_lost());
        assert!(StoreError::from(sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer"
        )))
        .is_connection_lost());
    }

    #[test]
    fn test_other_errors_are_not_connection_lost() {
        assert!(!StoreError::from(sqlx::Error::RowNotFound).is_connection_lost());
        assert!(!StoreError::Serialization("bad".into()).is_connection_lost());
    }
}
