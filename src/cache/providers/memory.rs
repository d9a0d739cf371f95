//! Process-local cache provider
//!
//! Backed by a `DashMap`. State is not shared across processes, so this is
//! for tests and single-process development only. An availability switch
//! simulates a cache outage; a responsiveness switch simulates a cache that
//! accepts requests but never answers.

use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::traits::CacheService;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-memory cache service
#[derive(Debug, Clone)]
pub struct MemoryCacheService {
    entries: Arc<DashMap<String, String>>,
    available: Arc<AtomicBool>,
    responsive: Arc<AtomicBool>,
}

impl Default for MemoryCacheService {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCacheService {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            available: Arc::new(AtomicBool::new(true)),
            responsive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Make every subsequent operation fail with a connection error (or recover)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make every subsequent operation hang without replying (or recover)
    pub fn set_responsive(&self, responsive: bool) {
        self.responsive.store(responsive, Ordering::SeqCst);
    }

    async fn ensure_available(&self) -> CacheResult<()> {
        if !self.responsive.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::ConnectionError(
                "memory cache marked unavailable".to_string(),
            ))
        }
    }
}

impl CacheService for MemoryCacheService {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.ensure_available().await?;
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        self.ensure_available().await?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn incr(&self, key: &str) -> CacheResult<i64> {
        self.ensure_available().await?;
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| "0".to_string());
        let current: i64 = entry.value().parse().map_err(|_| {
            CacheError::SerializationError(format!("value at {key} is not an integer"))
        })?;
        let next = current + 1;
        *entry.value_mut() = next.to_string();
        Ok(next)
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.ensure_available().await?;
        self.entries.remove(key);
        Ok(())
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(self.available.load(Ordering::SeqCst))
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}
