//! # Task Status and System Constants
//!
//! Canonical broker task states plus the fixed names this layer relies on
//! (the results channel, the default queue, header keys).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Queue every result message is routed to unless configured otherwise
pub const DEFAULT_RESULTS_QUEUE: &str = "task_results";

/// Queue used when a task type has no routing entry and no explicit queue
pub const DEFAULT_TASK_QUEUE: &str = "default";

/// Scheduling property keys read from task headers
pub mod headers {
    pub const RETRIES: &str = "retries";
    pub const ETA: &str = "eta";
    pub const EXPIRES: &str = "expires";
    pub const TIMELIMIT: &str = "timelimit";
    pub const COUNTDOWN: &str = "countdown";
    pub const CORRELATION_ID: &str = "correlation_id";
    pub const REPLY_TO: &str = "reply_to";
    pub const QUEUE: &str = "queue";
}

/// Broker task state.
///
/// The well-known states are enumerated; anything else a job reports
/// (for example an application-defined progress state) is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    /// Published but not yet picked up
    Pending,
    /// Received by a worker
    Received,
    /// Execution has begun
    Started,
    /// Execution reported intermediate progress
    Progress,
    /// Execution failed and is scheduled to retry
    Retry,
    /// Finished successfully
    Success,
    /// Finished with an error
    Failure,
    /// Cancelled before or during execution
    Revoked,
    /// Application-defined state
    Custom(String),
}

impl TaskStatus {
    /// Terminal ("ready") states: the row's output is final once one is reached
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Revoked)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Received => "RECEIVED",
            Self::Started => "STARTED",
            Self::Progress => "PROGRESS",
            Self::Retry => "RETRY",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Revoked => "REVOKED",
            Self::Custom(name) => name.as_str(),
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for TaskStatus {
    fn from(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "PENDING" => Self::Pending,
            "RECEIVED" => Self::Received,
            "STARTED" => Self::Started,
            "PROGRESS" => Self::Progress,
            "RETRY" => Self::Retry,
            "SUCCESS" => Self::Success,
            "FAILURE" => Self::Failure,
            "REVOKED" => Self::Revoked,
            _ => Self::Custom(value.to_string()),
        }
    }
}

impl From<String> for TaskStatus {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        status.as_str().to_string()
    }
}
