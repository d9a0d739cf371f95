//! # Publish Interceptor
//!
//! Turns a task message that is about to leave the process into tracking
//! rows, one per task, chain elements included. Rows are written as one
//! batch before the message is sent, so a chain is fully linked before any
//! element can run.
//!
//! The head message carries the rest of the chain last-first. Walking that
//! list backwards restores run order; each element's parent is the task
//! before it and its root is the head.
//!
//! Fan-out groups and chains created by a running worker are not expanded.

use super::options::OptionResolver;
use crate::error::{TrackingError, TrackingResult};
use crate::messaging::TaskMessage;
use crate::models::{CreateOutcome, NewTaskRecord, TaskStore};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct PublishInterceptor {
    store: Arc<dyn TaskStore>,
    resolver: OptionResolver,
}

impl PublishInterceptor {
    pub fn new(store: Arc<dyn TaskStore>, resolver: OptionResolver) -> Self {
        Self { store, resolver }
    }

    /// Persist a row for every task `message` schedules.
    ///
    /// Persistence errors are returned; the caller must not send the message.
    #[instrument(skip_all, fields(task_id = %message.id(), task_type = %message.task_type()))]
    pub async fn before_publish(&self, message: &TaskMessage) -> TrackingResult<Vec<CreateOutcome>> {
        let records = self.plan(message)?;
        let total = records.len();
        let outcomes = self.store.create_batch_if_absent(records).await?;

        let created = outcomes.iter().filter(|o| o.is_created()).count();
        if created < total {
            debug!(
                existing = total - created,
                "Some tracking rows already existed and were left untouched"
            );
        }
        info!(rows = total, created, "📝 Tracking rows persisted before publish");
        Ok(outcomes)
    }

    /// The rows `message` maps to, head first, in run order
    pub fn plan(&self, message: &TaskMessage) -> TrackingResult<Vec<NewTaskRecord>> {
        let headers = &message.headers;
        let head_options = self
            .resolver
            .resolve(&headers.task, headers.scheduling_options());
        let head = NewTaskRecord::new(&headers.id, &headers.task, message.body.clone())
            .with_options(head_options)
            .with_creator(headers.creator.clone())
            .with_related_object(headers.related_object.clone());

        if headers.is_worker_scheduled() {
            warn!(
                task_id = %headers.id,
                parent_id = ?headers.parent_id,
                root_id = ?headers.root_id,
                "Task scheduled from a running worker is tracked without chain linkage"
            );
        }
        if headers.chain.is_empty() {
            return Ok(vec![head]);
        }

        let root_id = headers.id.clone();
        let mut records = Vec::with_capacity(headers.chain.len() + 1);
        records.push(head.with_chain_link(None, root_id.clone(), 0, None));

        let mut parent_id = root_id.clone();
        for (offset, element) in headers.chain.iter().rev().enumerate() {
            let position = i32::try_from(offset + 1)
                .map_err(|_| TrackingError::malformed("task", "chain too long"))?;
            let options = self.resolver.resolve(&element.task, element.options.clone());
            records.push(
                NewTaskRecord::new(&element.id, &element.task, element.input())
                    .with_options(options)
                    .with_creator(headers.creator.clone())
                    .with_related_object(headers.related_object.clone())
                    .with_chain_link(
                        Some(parent_id.clone()),
                        root_id.clone(),
                        position,
                        element.immutable,
                    ),
            );
            parent_id = element.id.clone();
        }
        Ok(records)
    }
}
