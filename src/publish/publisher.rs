//! # Publisher
//!
//! Producer entry point. `apply_async` runs the publish pipeline in order:
//!
//! ```text
//! Signature / Chain
//!   └─ encode      -> TaskMessage (rest of chain reversed in headers)
//!   └─ intercept   -> PublishInterceptor::before_publish (rows persisted)
//!   └─ send        -> GuardedSender::send (breaker-guarded transmit)
//! ```
//!
//! A failure at any step returns before the next one runs.

use super::interceptor::PublishInterceptor;
use super::options::OptionResolver;
use super::signature::{Chain, Signature};
use crate::constants::TaskStatus;
use crate::error::TrackingResult;
use crate::messaging::{ChainElement, GuardedSender, MessageId, TaskHeaders, TaskMessage};
use crate::models::{
    aggregate_chain_output, aggregate_chain_status, find_required, TaskRecord, TaskStore,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Debug)]
pub struct Publisher {
    interceptor: PublishInterceptor,
    sender: Arc<GuardedSender>,
    resolver: OptionResolver,
}

impl Publisher {
    pub fn new(store: Arc<dyn TaskStore>, sender: Arc<GuardedSender>, resolver: OptionResolver) -> Self {
        Self {
            interceptor: PublishInterceptor::new(store, resolver.clone()),
            sender,
            resolver,
        }
    }

    /// Wire message for `chain`; the head's options are resolved, the rest are
    /// carried as the caller gave them.
    pub fn encode(&self, chain: &Chain) -> TrackingResult<TaskMessage> {
        let head = chain.head();
        let options = self.resolver.resolve(&head.task_type, head.options.clone());

        let mut headers = TaskHeaders::new(&head.id, &head.task_type).with_scheduling(&options)?;
        headers.creator = head.creator.clone();
        headers.related_object = head.related_object.clone();
        headers.chain = chain.rest().iter().rev().map(chain_element).collect();

        Ok(TaskMessage::new(headers, head.input()))
    }

    /// Persist tracking rows and publish. Returns a handle on the last task.
    ///
    /// Fails with `TrackingError::PublishUnavailable` while the publish
    /// breaker is open; the rows written before the send are kept.
    #[instrument(skip_all)]
    pub async fn apply_async(&self, work: impl Into<Chain>) -> TrackingResult<AsyncResult> {
        let chain: Chain = work.into();
        let message = self.encode(&chain)?;
        self.interceptor.before_publish(&message).await?;

        let queue = message
            .headers
            .scheduling_options()
            .queue
            .unwrap_or_else(|| self.resolver.queue_for(message.task_type()).to_string());
        let message_id = self.sender.send(&queue, &message.to_value()?).await?;

        info!(
            task_id = %message.id(),
            queue = %queue,
            message_id = %message_id,
            tasks = chain.len(),
            "🚀 Task published"
        );
        Ok(AsyncResult {
            task_id: chain.last().id.clone(),
            root_id: chain.is_chained().then(|| chain.head().id.clone()),
            queue,
            message_id,
        })
    }
}

fn chain_element(signature: &Signature) -> ChainElement {
    ChainElement {
        id: signature.id.clone(),
        task: signature.task_type.clone(),
        args: signature.args.clone(),
        kwargs: signature.kwargs.clone(),
        immutable: signature.immutable,
        options: signature.options.clone(),
    }
}

/// Handle on published work, read back from the task store
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncResult {
    /// The task whose outcome is the work's outcome: the last one of a chain
    pub task_id: String,
    /// Chain head, when the work was a chain
    pub root_id: Option<String>,
    pub queue: String,
    pub message_id: MessageId,
}

impl AsyncResult {
    pub async fn record(&self, store: &dyn TaskStore) -> TrackingResult<TaskRecord> {
        Ok(find_required(store, &self.task_id).await?)
    }

    pub async fn status(&self, store: &dyn TaskStore) -> TrackingResult<TaskStatus> {
        Ok(self.record(store).await?.status)
    }

    /// Reduced status of every task in the chain; the task's own status otherwise
    pub async fn chain_status(&self, store: &dyn TaskStore) -> TrackingResult<TaskStatus> {
        match &self.root_id {
            Some(root_id) => {
                let statuses: Vec<TaskStatus> = store
                    .find_chain(root_id)
                    .await?
                    .into_iter()
                    .map(|r| r.status)
                    .collect();
                Ok(aggregate_chain_status(&statuses))
            }
            None => self.status(store).await,
        }
    }

    /// Final output, once the work succeeded
    pub async fn output(&self, store: &dyn TaskStore) -> TrackingResult<Option<Value>> {
        match &self.root_id {
            Some(root_id) => Ok(aggregate_chain_output(&store.find_chain(root_id).await?)),
            None => {
                let record = self.record(store).await?;
                Ok((record.status == TaskStatus::Success)
                    .then_some(record.output)
                    .flatten())
            }
        }
    }
}
