//! # Models
//!
//! The task tracking record, its persistence, and chain aggregation.
//!
//! - [`task`] - `TaskRecord` and its creation form
//! - [`store`] - `TaskStore` trait shared by every backend
//! - [`pg_store`] - PostgreSQL backend
//! - [`memory_store`] - in-process backend
//! - [`chain`] - status and output reduction across a chain

pub mod chain;
pub mod errors;
pub mod memory_store;
pub mod pg_store;
pub mod store;
pub mod task;

pub use chain::{aggregate_chain_output, aggregate_chain_status};
pub use errors::{StoreError, StoreResult};
pub use memory_store::InMemoryTaskStore;
pub use pg_store::{find_required, PgTaskStore};
pub use store::{CreateOutcome, TaskStore};
pub use task::{NewTaskRecord, TaskInput, TaskOptions, TaskRecord, TimeLimit};
