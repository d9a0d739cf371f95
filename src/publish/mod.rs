//! # Publish Pipeline
//!
//! Producer API: describe work as a [`Signature`] or [`Chain`], hand it to
//! [`Publisher::apply_async`], read progress back through [`AsyncResult`].

pub mod interceptor;
pub mod options;
pub mod publisher;
pub mod signature;

pub use interceptor::PublishInterceptor;
pub use options::OptionResolver;
pub use publisher::{AsyncResult, Publisher};
pub use signature::{Chain, Signature};
