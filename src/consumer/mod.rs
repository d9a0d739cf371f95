//! # Consumers
//!
//! Long-running receive loops that keep tracking rows current:
//!
//! - [`TaskConsumer`] on the task queues: create-if-absent per task
//! - [`ResultConsumer`] on the results queue: status, output and log updates
//!
//! Both run inside [`ConsumerLoop`], which settles each delivery with the
//! acknowledgment rule of the active transport ([`acknowledge`]).

pub mod ack;
pub mod result_consumer;
pub mod runner;
pub mod task_consumer;

pub use ack::acknowledge;
pub use result_consumer::{verify_results_routing, ResultApplied, ResultConsumer};
pub use runner::{ConsumerLoop, DeliveryHandler, LoopSettings, Settlement};
pub use task_consumer::{record_for, TaskConsumer};

use crate::config::TrackingConfig;

impl LoopSettings {
    /// Task consumer settings: the configured task queues
    pub fn for_tasks(config: &TrackingConfig) -> Self {
        Self {
            queues: config.messaging.task_queues.clone(),
            batch_size: config.task_consumer.batch_size,
            visibility_timeout: config.messaging.visibility_timeout(),
            poll_interval: config.messaging.poll_interval(),
        }
    }

    /// Result consumer settings: the results queue alone, one message at a time
    pub fn for_results(config: &TrackingConfig) -> Self {
        Self {
            queues: vec![config.messaging.results_queue.clone()],
            batch_size: 1,
            visibility_timeout: config.messaging.visibility_timeout(),
            poll_interval: config.messaging.poll_interval(),
        }
    }
}
