//! # Database Operations
//!
//! Connection pooling and schema migrations for the tracking datastore.
//!
//! ```rust,no_run
//! use tasker_tracking::config::DatabaseConfig;
//! use tasker_tracking::database;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = database::connect(&DatabaseConfig::default()).await?;
//! database::run_migrations(&pool).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::DatabaseConfig;
use crate::models::{StoreError, StoreResult};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

/// Build a connection pool from configuration
pub async fn connect(config: &DatabaseConfig) -> StoreResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .test_before_acquire(true)
        .connect(&config.url)
        .await?;

    info!(
        max_connections = config.max_connections,
        "💾 Tracking datastore pool initialized"
    );
    Ok(pool)
}

/// Apply every migration under `migrations/`
pub async fn run_migrations(pool: &PgPool) -> StoreResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::query("migrate", e.to_string()))?;

    info!("💾 Tracking datastore migrations applied");
    Ok(())
}
