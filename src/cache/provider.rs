//! Cache provider enum dispatch

use super::errors::CacheResult;
use super::providers::{MemoryCacheService, RedisCacheService};
use super::traits::CacheService;
use crate::config::{CacheBackendKind, CacheConfig};
use tracing::info;

/// Concrete cache backend, dispatched without a vtable
#[derive(Debug, Clone)]
pub enum CacheProvider {
    Redis(Box<RedisCacheService>),
    Memory(MemoryCacheService),
}

impl CacheProvider {
    /// Build the configured backend.
    ///
    /// A Redis backend that cannot connect at start-up is an error here; once
    /// running, outages are absorbed by the breaker state store instead.
    pub async fn from_config(config: &CacheConfig) -> CacheResult<Self> {
        match config.backend {
            CacheBackendKind::Redis => {
                let service =
                    RedisCacheService::connect(&config.redis_url, config.operation_timeout())
                        .await?;
                info!(backend = "redis", "Breaker state cache initialized");
                Ok(Self::Redis(Box::new(service)))
            }
            CacheBackendKind::Memory => {
                info!(
                    backend = "memory",
                    "Breaker state cache initialized (process-local)"
                );
                Ok(Self::Memory(MemoryCacheService::new()))
            }
        }
    }

    /// Whether state written here is visible to other processes
    pub fn is_distributed(&self) -> bool {
        matches!(self, Self::Redis(_))
    }
}

impl From<MemoryCacheService> for CacheProvider {
    fn from(service: MemoryCacheService) -> Self {
        Self::Memory(service)
    }
}

impl From<RedisCacheService> for CacheProvider {
    fn from(service: RedisCacheService) -> Self {
        Self::Redis(Box::new(service))
    }
}

impl CacheService for CacheProvider {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        match self {
            Self::Redis(s) => s.get(key).await,
            Self::Memory(s) => s.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        match self {
            Self::Redis(s) => s.set(key, value).await,
            Self::Memory(s) => s.set(key, value).await,
        }
    }

    async fn incr(&self, key: &str) -> CacheResult<i64> {
        match self {
            Self::Redis(s) => s.incr(key).await,
            Self::Memory(s) => s.incr(key).await,
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        match self {
            Self::Redis(s) => s.delete(key).await,
            Self::Memory(s) => s.delete(key).await,
        }
    }

    async fn health_check(&self) -> CacheResult<bool> {
        match self {
            Self::Redis(s) => s.health_check().await,
            Self::Memory(s) => s.health_check().await,
        }
    }

    fn provider_name(&self) -> &'static str {
        match self {
            Self::Redis(s) => s.provider_name(),
            Self::Memory(s) => s.provider_name(),
        }
    }
}
