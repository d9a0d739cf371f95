//! # PostgreSQL Task Store
//!
//! Create-if-absent is `INSERT ... ON CONFLICT (id) DO NOTHING`; log appends
//! use `log || jsonb_build_array($n)` inside the UPDATE so concurrent progress
//! messages never overwrite each other.

use super::errors::{StoreError, StoreResult};
use super::store::{CreateOutcome, TaskStore};
use super::task::{NewTaskRecord, TaskRecord};
use crate::constants::TaskStatus;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use tracing::{debug, warn};

const SELECT_COLUMNS: &str = r#"
    SELECT id, type, status, input, options, output, log, creator, related_object,
           parent_id, root_id, chain_position, immutable, created_at, updated_at
    FROM task_records
"#;

const INSERT_IF_ABSENT: &str = r#"
    INSERT INTO task_records (
        id, type, status, input, options, creator, related_object,
        parent_id, root_id, chain_position, immutable
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
    ON CONFLICT (id) DO NOTHING
    RETURNING id
"#;

#[derive(Debug)]
pub struct PgTaskStore {
    pool: RwLock<PgPool>,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: RwLock::new(pool),
        }
    }

    pub fn pool(&self) -> PgPool {
        self.pool.read().clone()
    }

    async fn insert<'e, E>(executor: E, record: &NewTaskRecord) -> StoreResult<CreateOutcome>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let inserted: Option<(String,)> = sqlx::query_as(INSERT_IF_ABSENT)
            .bind(&record.id)
            .bind(&record.task_type)
            .bind(record.status.as_str())
            .bind(Json(&record.input))
            .bind(Json(&record.options))
            .bind(&record.creator)
            .bind(&record.related_object)
            .bind(&record.parent_id)
            .bind(&record.root_id)
            .bind(record.chain_position)
            .bind(record.immutable)
            .fetch_optional(executor)
            .await?;

        Ok(match inserted {
            Some(_) => CreateOutcome::Created,
            None => CreateOutcome::AlreadyExists,
        })
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn create_if_absent(&self, record: NewTaskRecord) -> StoreResult<CreateOutcome> {
        let pool = self.pool();
        Self::insert(&pool, &record).await
    }

    async fn create_batch_if_absent(
        &self,
        records: Vec<NewTaskRecord>,
    ) -> StoreResult<Vec<CreateOutcome>> {
        let pool = self.pool();
        let mut tx = pool.begin().await?;
        let mut outcomes = Vec::with_capacity(records.len());
        for record in &records {
            outcomes.push(Self::insert(&mut *tx, record).await?);
        }
        tx.commit().await?;
        Ok(outcomes)
    }

    async fn find(&self, id: &str) -> StoreResult<Option<TaskRecord>> {
        let pool = self.pool();
        let record = sqlx::query_as::<_, TaskRecord>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&pool)
            .await?;
        Ok(record)
    }

    async fn find_chain(&self, root_id: &str) -> StoreResult<Vec<TaskRecord>> {
        let pool = self.pool();
        let records = sqlx::query_as::<_, TaskRecord>(&format!(
            "{SELECT_COLUMNS} WHERE root_id = $1 ORDER BY chain_position ASC NULLS FIRST, created_at ASC"
        ))
        .bind(root_id)
        .fetch_all(&pool)
        .await?;
        Ok(records)
    }

    async fn update_status(&self, id: &str, status: &TaskStatus) -> StoreResult<bool> {
        let pool = self.pool();
        let result =
            sqlx::query("UPDATE task_records SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(status.as_str())
                .execute(&pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_outcome(
        &self,
        id: &str,
        status: &TaskStatus,
        output: Value,
    ) -> StoreResult<bool> {
        let pool = self.pool();
        let result = sqlx::query(
            "UPDATE task_records SET status = $2, output = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(Json(output))
        .execute(&pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn append_log(&self, id: &str, status: &TaskStatus, entry: Value) -> StoreResult<bool> {
        let pool = self.pool();
        let result = sqlx::query(
            r#"
            UPDATE task_records
            SET status = $2,
                log = log || jsonb_build_array($3::jsonb),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(Json(entry))
        .execute(&pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn reset_connection(&self) -> StoreResult<()> {
        let stale = self.pool();
        let fresh = stale
            .options()
            .clone()
            .connect_lazy_with((*stale.connect_options()).clone());
        *self.pool.write() = fresh;

        warn!("💾 Datastore connection reset, stale pool closing");
        tokio::spawn(async move {
            stale.close().await;
            debug!("Stale datastore pool closed");
        });
        Ok(())
    }
}

impl From<PgPool> for PgTaskStore {
    fn from(pool: PgPool) -> Self {
        Self::new(pool)
    }
}

/// Lookup helper for callers that require the row to exist
pub async fn find_required(store: &dyn TaskStore, id: &str) -> StoreResult<TaskRecord> {
    store.find(id).await?.ok_or_else(|| StoreError::NotFound {
        task_id: id.to_string(),
    })
}
