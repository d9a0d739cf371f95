//! # Result Consumer
//!
//! Applies completion and progress reports from the results queue to
//! tracking rows.
//!
//! Results and tasks travel on independent queues, so a result can arrive
//! before its row exists. The row is looked up a bounded number of times
//! with a pause in between; a result still without a row is logged as
//! orphaned and dropped.
//!
//! Every delivery is acknowledged, whatever happened to it.

use super::runner::{DeliveryHandler, Settlement};
use crate::config::{ConfigurationError, MessagingConfig, ResultConsumerConfig};
use crate::error::{classify_result_error, TrackingError, TrackingResult};
use crate::messaging::{Delivery, ResultMessage};
use crate::models::TaskStore;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// How a result changed its row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultApplied {
    /// Terminal status and output written
    Outcome,
    /// Status written and one log entry appended
    LogAppended,
    /// Status written
    StatusOnly,
}

#[derive(Debug, Clone)]
pub struct ResultConsumer {
    store: Arc<dyn TaskStore>,
    max_lookups: u32,
    lookup_delay: Duration,
}

impl ResultConsumer {
    pub fn new(store: Arc<dyn TaskStore>, config: &ResultConsumerConfig) -> Self {
        Self {
            store,
            max_lookups: config.missing_task_retries.max(1),
            lookup_delay: config.missing_task_delay(),
        }
    }

    /// Refuses to build a consumer when ordinary job workers would also
    /// consume the results queue.
    pub fn from_config(
        store: Arc<dyn TaskStore>,
        messaging: &MessagingConfig,
        config: &ResultConsumerConfig,
    ) -> TrackingResult<Self> {
        verify_results_routing(messaging)?;
        Ok(Self::new(store, config))
    }

    pub async fn process(&self, payload: Value) -> TrackingResult<ResultApplied> {
        let result = ResultMessage::from_value(payload)?;
        self.await_row(&result.task_id).await?;

        let ResultMessage {
            task_id,
            status,
            result,
        } = result;

        let (found, applied) = if status.is_ready() {
            let found = self.store.record_outcome(&task_id, &status, result).await?;
            (found, ResultApplied::Outcome)
        } else {
            let mut progress = match result {
                Value::Object(progress) => progress,
                Value::Null => Default::default(),
                other => {
                    return Err(TrackingError::malformed(
                        "result",
                        format!("{status} payload for {task_id} is not an object: {other}"),
                    ))
                }
            };
            match progress.remove("log") {
                Some(entry) => (
                    self.store.append_log(&task_id, &status, entry).await?,
                    ResultApplied::LogAppended,
                ),
                None => (
                    self.store.update_status(&task_id, &status).await?,
                    ResultApplied::StatusOnly,
                ),
            }
        };

        if !found {
            return Err(TrackingError::OrphanedResult {
                task_id,
                attempts: self.max_lookups,
            });
        }
        debug!(task_id = %task_id, status = %status, applied = ?applied, "Result applied");
        Ok(applied)
    }

    async fn await_row(&self, task_id: &str) -> TrackingResult<()> {
        for attempt in 1..=self.max_lookups {
            if self.store.find(task_id).await?.is_some() {
                return Ok(());
            }
            if attempt < self.max_lookups {
                debug!(
                    task_id = %task_id,
                    attempt,
                    max_lookups = self.max_lookups,
                    "Result arrived before its tracking row, retrying lookup"
                );
                sleep(self.lookup_delay).await;
            }
        }
        Err(TrackingError::OrphanedResult {
            task_id: task_id.to_string(),
            attempts: self.max_lookups,
        })
    }
}

/// The results queue must not be among the generic workers' queues
pub fn verify_results_routing(messaging: &MessagingConfig) -> Result<(), ConfigurationError> {
    if messaging
        .worker_queues
        .iter()
        .any(|queue| queue == &messaging.results_queue)
    {
        return Err(ConfigurationError::Conflict(format!(
            "results queue '{}' is consumed by the job worker pool; results would never be reconciled",
            messaging.results_queue
        )));
    }
    Ok(())
}

#[async_trait]
impl DeliveryHandler for ResultConsumer {
    fn name(&self) -> &'static str {
        "result_consumer"
    }

    async fn handle(&self, delivery: &Delivery) -> Settlement {
        let error = match self.process(delivery.payload.clone()).await {
            Ok(ResultApplied::Outcome) => {
                info!(receipt = %delivery.info.receipt_handle, "✅ Task outcome recorded");
                return Settlement::Ack;
            }
            Ok(_) => return Settlement::Ack,
            Err(error) => error,
        };

        match &error {
            TrackingError::OrphanedResult { task_id, attempts } => {
                warn!(
                    task_id = %task_id,
                    attempts,
                    payload = %delivery.payload,
                    "Orphaned result dropped: no tracking row"
                );
            }
            TrackingError::MalformedMessage { .. } => {
                warn!(payload = %delivery.payload, error = %error, "Malformed result dropped");
            }
            _ => {
                error!(payload = %delivery.payload, error = %error, "Failed to apply result, dropping it");
            }
        }
        classify_result_error(&error).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TaskStatus;
    use crate::messaging::{DeliveryInfo, ReceiptHandle};
    use crate::models::{InMemoryTaskStore, NewTaskRecord, TaskInput};
    use serde_json::json;

    fn consumer(store: Arc<InMemoryTaskStore>, retries: u32) -> ResultConsumer {
        ResultConsumer::new(
            store,
            &ResultConsumerConfig {
                missing_task_retries: retries,
                missing_task_delay_ms: 1,
            },
        )
    }

    async fn seeded(id: &str) -> Arc<InMemoryTaskStore> {
        let store = Arc::new(InMemoryTaskStore::new());
        store
            .create_if_absent(NewTaskRecord::new(id, "exports.generate", TaskInput::default()))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_terminal_result_overwrites_status_and_output() {
        let store = seeded("t1").await;
        let applied = consumer(store.clone(), 3)
            .process(json!({"task_id": "t1", "status": "SUCCESS", "result": {"rows": 10}}))
            .await
            .unwrap();

        assert_eq!(applied, ResultApplied::Outcome);
        let record = store.find("t1").await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Success);
        assert_eq!(record.output, Some(json!({"rows": 10})));
    }

    #[tokio::test]
    async fn test_progress_appends_log_entry() {
        let store = seeded("t1").await;
        let consumer = consumer(store.clone(), 3);
        for step in ["fetching", "rendering"] {
            let applied = consumer
                .process(json!({"task_id": "t1", "status": "PROGRESS", "result": {"log": step, "pct": 50}}))
                .await
                .unwrap();
            assert_eq!(applied, ResultApplied::LogAppended);
        }
        let record = store.find("t1").await.unwrap().unwrap();
        assert_eq!(record.log, vec![json!("fetching"), json!("rendering")]);
        assert_eq!(record.status, TaskStatus::Progress);
        assert_eq!(record.output, None);
    }

    #[tokio::test]
    async fn test_progress_without_log_only_updates_status() {
        let store = seeded("t1").await;
        let applied = consumer(store.clone(), 3)
            .process(json!({"task_id": "t1", "status": "STARTED", "result": null}))
            .await
            .unwrap();
        assert_eq!(applied, ResultApplied::StatusOnly);
        assert_eq!(store.find("t1").await.unwrap().unwrap().status, TaskStatus::Started);
    }

    #[tokio::test]
    async fn test_unstructured_progress_is_malformed_and_acked() {
        let store = seeded("t1").await;
        let consumer = consumer(store.clone(), 3);
        let payload = json!({"task_id": "t1", "status": "PROGRESS", "result": "half way"});

        let err = consumer.process(payload.clone()).await.unwrap_err();
        assert!(matches!(err, TrackingError::MalformedMessage { kind: "result", .. }));

        let delivery = Delivery::new(payload, DeliveryInfo::new("task_results", ReceiptHandle::from(1_i64)));
        assert_eq!(consumer.handle(&delivery).await, Settlement::Ack);
        assert_eq!(store.find("t1").await.unwrap().unwrap().status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_missing_row_is_orphaned_after_bounded_lookups() {
        let store = Arc::new(InMemoryTaskStore::new());
        let err = consumer(store, 4)
            .process(json!({"task_id": "ghost", "status": "SUCCESS", "result": 1}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TrackingError::OrphanedResult { attempts: 4, .. }
        ));
    }

    #[tokio::test]
    async fn test_result_racing_ahead_of_its_row_is_applied() {
        let store = Arc::new(InMemoryTaskStore::new());
        let consumer = ResultConsumer::new(
            store.clone(),
            &ResultConsumerConfig {
                missing_task_retries: 50,
                missing_task_delay_ms: 10,
            },
        );

        let late_store = store.clone();
        let creator = tokio::spawn(async move {
            sleep(Duration::from_millis(30)).await;
            late_store
                .create_if_absent(NewTaskRecord::new("late", "jobs.late", TaskInput::default()))
                .await
                .unwrap();
        });

        let applied = consumer
            .process(json!({"task_id": "late", "status": "FAILURE", "result": {"exc": "boom"}}))
            .await
            .unwrap();
        creator.await.unwrap();
        assert_eq!(applied, ResultApplied::Outcome);
        assert_eq!(store.find("late").await.unwrap().unwrap().status, TaskStatus::Failure);
    }

    #[test]
    fn test_results_queue_in_worker_pool_fails_fast() {
        let mut messaging = MessagingConfig::default();
        assert!(verify_results_routing(&messaging).is_ok());

        messaging.worker_queues.push("task_results".into());
        let err = ResultConsumer::from_config(
            Arc::new(InMemoryTaskStore::new()),
            &messaging,
            &ResultConsumerConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TrackingError::Configuration(ConfigurationError::Conflict(_))));
    }

    #[test]
    fn test_every_error_class_is_dropped() {
        let err = TrackingError::OrphanedResult {
            task_id: "t".into(),
            attempts: 1,
        };
        assert!(classify_result_error(&err).should_ack());
    }
}
