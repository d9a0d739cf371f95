//! In-process task store
//!
//! `DashMap`-backed; each mutation holds the entry's shard lock, which gives
//! the same create-if-absent and atomic-append guarantees as the Postgres
//! store within one process. Failures can be injected for consumer tests.

use super::errors::{StoreError, StoreResult};
use super::store::{CreateOutcome, TaskStore};
use super::task::{NewTaskRecord, TaskRecord};
use crate::constants::TaskStatus;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskStore {
    records: Arc<DashMap<String, TaskRecord>>,
    injected_failures: Arc<Mutex<VecDeque<StoreError>>>,
    connection_resets: Arc<AtomicUsize>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next store operation fails with `error` (queued, one per call)
    pub fn inject_failure(&self, error: StoreError) {
        self.injected_failures.lock().push_back(error);
    }

    pub fn connection_resets(&self) -> usize {
        self.connection_resets.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn check_injected(&self) -> StoreResult<()> {
        match self.injected_failures.lock().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn mutate(&self, id: &str, apply: impl FnOnce(&mut TaskRecord)) -> bool {
        match self.records.get_mut(id) {
            Some(mut record) => {
                apply(record.value_mut());
                record.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create_if_absent(&self, record: NewTaskRecord) -> StoreResult<CreateOutcome> {
        self.check_injected()?;
        Ok(match self.records.entry(record.id.clone()) {
            Entry::Occupied(_) => CreateOutcome::AlreadyExists,
            Entry::Vacant(slot) => {
                slot.insert(record.into_record(Utc::now()));
                CreateOutcome::Created
            }
        })
    }

    async fn create_batch_if_absent(
        &self,
        records: Vec<NewTaskRecord>,
    ) -> StoreResult<Vec<CreateOutcome>> {
        self.check_injected()?;
        let now = Utc::now();
        Ok(records
            .into_iter()
            .map(|record| match self.records.entry(record.id.clone()) {
                Entry::Occupied(_) => CreateOutcome::AlreadyExists,
                Entry::Vacant(slot) => {
                    slot.insert(record.into_record(now));
                    CreateOutcome::Created
                }
            })
            .collect())
    }

    async fn find(&self, id: &str) -> StoreResult<Option<TaskRecord>> {
        self.check_injected()?;
        Ok(self.records.get(id).map(|r| r.value().clone()))
    }

    async fn find_chain(&self, root_id: &str) -> StoreResult<Vec<TaskRecord>> {
        self.check_injected()?;
        let mut chain: Vec<TaskRecord> = self
            .records
            .iter()
            .filter(|r| r.root_id.as_deref() == Some(root_id))
            .map(|r| r.value().clone())
            .collect();
        chain.sort_by_key(|r| (r.chain_position, r.created_at));
        Ok(chain)
    }

    async fn update_status(&self, id: &str, status: &TaskStatus) -> StoreResult<bool> {
        self.check_injected()?;
        Ok(self.mutate(id, |r| r.status = status.clone()))
    }

    async fn record_outcome(
        &self,
        id: &str,
        status: &TaskStatus,
        output: Value,
    ) -> StoreResult<bool> {
        self.check_injected()?;
        Ok(self.mutate(id, |r| {
            r.status = status.clone();
            r.output = Some(output);
        }))
    }

    async fn append_log(&self, id: &str, status: &TaskStatus, entry: Value) -> StoreResult<bool> {
        self.check_injected()?;
        Ok(self.mutate(id, |r| {
            r.status = status.clone();
            r.log.push(entry);
        }))
    }

    async fn reset_connection(&self) -> StoreResult<()> {
        self.connection_resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskInput;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_if_absent_never_overwrites() {
        let store = InMemoryTaskStore::new();
        let first = NewTaskRecord::new("t1", "jobs.a", TaskInput::default());
        let mut second = NewTaskRecord::new("t1", "jobs.b", TaskInput::default());
        second.status = TaskStatus::Started;

        assert!(store.create_if_absent(first).await.unwrap().is_created());
        assert_eq!(
            store.create_if_absent(second).await.unwrap(),
            CreateOutcome::AlreadyExists
        );
        let record = store.find("t1").await.unwrap().unwrap();
        assert_eq!(record.task_type, "jobs.a");
        assert_eq!(record.status, TaskStatus::Pending);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_updates_report_missing_rows() {
        let store = InMemoryTaskStore::new();
        assert!(!store.update_status("nope", &TaskStatus::Started).await.unwrap());
        assert!(!store
            .record_outcome("nope", &TaskStatus::Success, json!(1))
            .await
            .unwrap());
        assert!(!store
            .append_log("nope", &TaskStatus::Progress, json!("x"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_every_entry() {
        let store = InMemoryTaskStore::new();
        store
            .create_if_absent(NewTaskRecord::new("t1", "jobs.a", TaskInput::default()))
            .await
            .unwrap();

        let handles: Vec<_> = (0..50)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .append_log("t1", &TaskStatus::Progress, json!(i))
                        .await
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap());
        }
        assert_eq!(store.find("t1").await.unwrap().unwrap().log.len(), 50);
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let store = InMemoryTaskStore::new();
        store.inject_failure(StoreError::ConnectionLost("reset".into()));
        assert!(store.find("t1").await.unwrap_err().is_connection_lost());
        assert!(store.find("t1").await.unwrap().is_none());
    }
}
