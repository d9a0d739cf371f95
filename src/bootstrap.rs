//! # Tracking System Bootstrap
//!
//! Builds every collaborator from one [`TrackingConfig`] in dependency order:
//! datastore, breaker cache, breaker registry, transport, guarded send path,
//! publisher. Consumers are built on demand from the assembled system.

use crate::cache::{CacheProvider, MemoryCacheService};
use crate::config::TrackingConfig;
use crate::consumer::{ConsumerLoop, LoopSettings, ResultConsumer, TaskConsumer};
use crate::database;
use crate::error::TrackingResult;
use crate::messaging::{
    connect_transport, GuardedSender, InMemoryMessagingService, MessagingError, MessagingService,
    TransportKind,
};
use crate::models::{InMemoryTaskStore, PgTaskStore, TaskStore};
use crate::publish::{OptionResolver, Publisher};
use crate::resilience::CircuitBreakerRegistry;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct TrackingSystem {
    config: Arc<TrackingConfig>,
    pool: Option<PgPool>,
    store: Arc<dyn TaskStore>,
    transport: Arc<dyn MessagingService>,
    breakers: Arc<CircuitBreakerRegistry<MessagingError>>,
    sender: Arc<GuardedSender>,
    publisher: Arc<Publisher>,
}

impl TrackingSystem {
    /// Connect to the configured datastore, cache and broker
    pub async fn bootstrap(config: TrackingConfig) -> TrackingResult<Self> {
        config.validate()?;
        info!(transport = %config.messaging.transport, "🚀 Bootstrapping tracking system");

        let pool = database::connect(&config.database).await?;
        let store: Arc<dyn TaskStore> = Arc::new(PgTaskStore::new(pool.clone()));
        let cache = CacheProvider::from_config(&config.cache).await?;
        let transport = connect_transport(&config.messaging, &pool).await;

        Self::assemble(config, Some(pool), store, cache, transport)
    }

    /// Process-local system: in-memory store, cache and transport
    pub fn in_memory(mut config: TrackingConfig) -> TrackingResult<Self> {
        config.messaging.transport = TransportKind::InMemory;
        Self::assemble(
            config,
            None,
            Arc::new(InMemoryTaskStore::new()),
            MemoryCacheService::new().into(),
            Arc::new(InMemoryMessagingService::new()),
        )
    }

    /// Wire already-built collaborators together
    pub fn assemble(
        config: TrackingConfig,
        pool: Option<PgPool>,
        store: Arc<dyn TaskStore>,
        cache: CacheProvider,
        transport: Arc<dyn MessagingService>,
    ) -> TrackingResult<Self> {
        config.validate()?;
        let breakers = Arc::new(
            CircuitBreakerRegistry::new(cache, config.cache.key_prefix.clone())
                .with_cache_timeout(config.cache.operation_timeout()),
        );
        let sender = Arc::new(GuardedSender::from_settings(
            Arc::clone(&transport),
            &breakers,
            &config.circuit_breaker,
            config.messaging.declared_queues(),
        )?);
        let publisher = Arc::new(Publisher::new(
            Arc::clone(&store),
            Arc::clone(&sender),
            OptionResolver::from_config(&config.messaging),
        ));

        Ok(Self {
            config: Arc::new(config),
            pool,
            store,
            transport,
            breakers,
            sender,
            publisher,
        })
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Datastore pool, absent for an in-memory system
    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    pub fn transport(&self) -> &Arc<dyn MessagingService> {
        &self.transport
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry<MessagingError>> {
        &self.breakers
    }

    pub fn sender(&self) -> &Arc<GuardedSender> {
        &self.sender
    }

    pub fn publisher(&self) -> &Arc<Publisher> {
        &self.publisher
    }

    pub fn task_consumer(&self) -> ConsumerLoop<TaskConsumer> {
        ConsumerLoop::new(
            Arc::clone(&self.transport),
            TaskConsumer::new(Arc::clone(&self.store)),
            LoopSettings::for_tasks(&self.config),
        )
    }

    /// Fails when the job worker pool is configured to consume the results queue
    pub fn result_consumer(&self) -> TrackingResult<ConsumerLoop<ResultConsumer>> {
        let consumer = ResultConsumer::from_config(
            Arc::clone(&self.store),
            &self.config.messaging,
            &self.config.result_consumer,
        )?;
        Ok(ConsumerLoop::new(
            Arc::clone(&self.transport),
            consumer,
            LoopSettings::for_results(&self.config),
        ))
    }
}
