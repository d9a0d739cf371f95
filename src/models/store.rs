//! Task store abstraction

use super::errors::StoreResult;
use super::task::{NewTaskRecord, TaskRecord};
use crate::constants::TaskStatus;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Outcome of an idempotent create
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// A row with this id already existed and was left untouched
    AlreadyExists,
}

impl CreateOutcome {
    pub fn is_created(self) -> bool {
        matches!(self, Self::Created)
    }
}

/// Persistence for task tracking rows.
///
/// Implementations must tolerate concurrent writers for the same id: creation
/// is create-if-absent and log appends are atomic.
#[async_trait]
pub trait TaskStore: Send + Sync + fmt::Debug {
    /// Insert the row unless one with the same id exists
    async fn create_if_absent(&self, record: NewTaskRecord) -> StoreResult<CreateOutcome>;

    /// Insert every row that does not exist yet, all or nothing
    async fn create_batch_if_absent(
        &self,
        records: Vec<NewTaskRecord>,
    ) -> StoreResult<Vec<CreateOutcome>>;

    async fn find(&self, id: &str) -> StoreResult<Option<TaskRecord>>;

    /// Every row sharing `root_id`, head first, in chain order
    async fn find_chain(&self, root_id: &str) -> StoreResult<Vec<TaskRecord>>;

    /// Overwrite status; `false` when no row has this id
    async fn update_status(&self, id: &str, status: &TaskStatus) -> StoreResult<bool>;

    /// Overwrite status and output; `false` when no row has this id
    async fn record_outcome(
        &self,
        id: &str,
        status: &TaskStatus,
        output: Value,
    ) -> StoreResult<bool>;

    /// Overwrite status and atomically append one log entry; `false` when no row has this id
    async fn append_log(&self, id: &str, status: &TaskStatus, entry: Value) -> StoreResult<bool>;

    /// Drop stale connections so the next operation starts clean
    async fn reset_connection(&self) -> StoreResult<()>;
}
