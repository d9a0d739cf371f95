//! Transport implementations of [`MessagingService`](super::MessagingService)

pub mod in_memory;
pub mod pgmq;
pub mod sqs;

pub use self::in_memory::InMemoryMessagingService;
pub use self::pgmq::PgmqMessagingService;
pub use self::sqs::SqsMessagingService;
