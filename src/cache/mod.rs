//! # Shared Cache
//!
//! Backing store for circuit breaker bookkeeping shared across processes.
//!
//! ```text
//! CacheProvider (enum)             <- zero-cost dispatch, no vtable
//!   ├── Redis(RedisCacheService)   <- ConnectionManager-based async Redis
//!   └── Memory(MemoryCacheService) <- process-local, tests and development
//! ```
//!
//! Only get/set/incr/delete are needed. Values never expire and a missing
//! key means "use the fallback", not an error.

pub mod errors;
pub mod provider;
pub mod providers;
pub mod traits;

pub use errors::{CacheError, CacheResult};
pub use provider::CacheProvider;
pub use providers::{MemoryCacheService, RedisCacheService};
pub use traits::CacheService;
