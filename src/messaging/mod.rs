//! # Messaging Module
//!
//! Broker transports behind one [`MessagingService`] trait, the wire formats,
//! and the breaker-guarded send path.
//!
//! ```text
//! Arc<dyn MessagingService>
//!   ├── PgmqMessagingService      <- default, shares the datastore pool
//!   ├── SqsMessagingService       <- vendor queue, ack = explicit delete
//!   └── InMemoryMessagingService  <- tests and development
//! ```

pub mod errors;
pub mod guarded;
pub mod message;
pub mod properties;
pub mod providers;
pub mod service;
pub mod types;

pub use errors::{MessagingError, MessagingErrorKind, MessagingResult};
pub use guarded::{expected_messaging_errors, GuardedSender};
pub use message::{ChainElement, ResultMessage, TaskHeaders, TaskMessage};
pub use properties::normalize_properties;
pub use providers::{InMemoryMessagingService, PgmqMessagingService, SqsMessagingService};
pub use service::MessagingService;
pub use types::{Delivery, DeliveryInfo, MessageId, ReceiptHandle, SqsDeliveryInfo, TransportKind};

use crate::config::MessagingConfig;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

/// Build the configured transport. `pool` backs the pgmq transport.
pub async fn connect_transport(config: &MessagingConfig, pool: &PgPool) -> Arc<dyn MessagingService> {
    let transport: Arc<dyn MessagingService> = match config.transport {
        TransportKind::Pgmq => Arc::new(PgmqMessagingService::new_with_pool(pool.clone()).await),
        TransportKind::Sqs => Arc::new(SqsMessagingService::from_config(&config.sqs).await),
        TransportKind::InMemory => Arc::new(InMemoryMessagingService::new()),
    };
    info!(transport = %transport.transport_kind(), "Messaging transport initialized");
    transport
}
