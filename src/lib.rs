#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tasker Tracking
//!
//! Delivery tracking and publish-path resilience for broker-backed
//! background jobs.
//!
//! ## Overview
//!
//! Every scheduled job, chains included, is recorded at the moment it is
//! published. Completion and progress reports arrive on a separate results
//! queue and are reconciled onto those records, even when they overtake the
//! record itself. The publish path is guarded by a circuit breaker whose
//! state is shared through a cache, so a broker outage surfaces as a fast
//! local error instead of hanging callers.
//!
//! ```text
//! producer ─► Publisher ─► PublishInterceptor ─► GuardedSender ─► broker
//!                              │ rows                               │
//!                              ▼                                    ▼
//!                          TaskStore ◄── TaskConsumer ◄─── task queues
//!                              ▲
//!                              └──────── ResultConsumer ◄── results queue
//! ```
//!
//! ## Module Organization
//!
//! - [`models`] - tracking record, task stores, chain aggregation
//! - [`messaging`] - transports (pgmq, SQS, in-memory), wire formats, guarded send
//! - [`publish`] - signatures, chains and the publish pipeline
//! - [`consumer`] - task and result consumers with transport-specific acks
//! - [`resilience`] - cache-backed circuit breaker and its registry
//! - [`cache`] - breaker state backends (Redis, in-memory)
//! - [`config`] - layered configuration
//! - [`bootstrap`] - assembles the system from configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tasker_tracking::config::TrackingConfig;
//! use tasker_tracking::publish::Signature;
//! use tasker_tracking::TrackingSystem;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let system = TrackingSystem::bootstrap(TrackingConfig::default()).await?;
//!
//! let chain = Signature::new("exports.generate")
//!     .with_kwarg("format", json!("csv"))
//!     .then(Signature::new("notify.email"));
//! let handle = system.publisher().apply_async(chain).await?;
//!
//! let status = handle.chain_status(system.store().as_ref()).await?;
//! println!("chain {} is {status}", handle.task_id);
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod constants;
pub mod consumer;
pub mod database;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod publish;
pub mod resilience;

pub use bootstrap::TrackingSystem;
pub use config::{ConfigManager, TrackingConfig};
pub use constants::TaskStatus;
pub use error::{ErrorDisposition, TrackingError, TrackingResult};
pub use models::{TaskRecord, TaskStore};
pub use publish::{AsyncResult, Chain, Publisher, Signature};
