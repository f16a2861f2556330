use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::context::SagaContext;
use crate::error::{Result, SagaError};
use crate::log::{SagaLog, StepLog};
use crate::repository::SagaLogRepository;
use crate::state::SagaStatus;

const SAGA_COLUMNS: &str =
    "saga_id, saga_type, status, steps, context, failure_reason, started_at, completed_at";

/// PostgreSQL-backed saga log repository over the `saga_logs` table.
#[derive(Clone)]
pub struct PostgresSagaLogRepository {
    pool: PgPool,
}

impl PostgresSagaLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_log(row: PgRow) -> Result<SagaLog> {
        let status: String = row.try_get("status")?;
        let status = SagaStatus::parse(&status)
            .ok_or_else(|| SagaError::Step(format!("Unknown saga status: {status}")))?;

        Ok(SagaLog {
            saga_id: row.try_get("saga_id")?,
            saga_type: row.try_get("saga_type")?,
            status,
            steps: serde_json::from_value(row.try_get("steps")?)?,
            context: serde_json::from_value(row.try_get("context")?)?,
            failure_reason: row.try_get("failure_reason")?,
            started_at: row.try_get::<DateTime<Utc>, _>("started_at")?,
            completed_at: row.try_get::<Option<DateTime<Utc>>, _>("completed_at")?,
        })
    }

    fn ensure_updated(saga_id: &str, rows: u64) -> Result<()> {
        if rows == 0 {
            return Err(SagaError::NotFound(saga_id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SagaLogRepository for PostgresSagaLogRepository {
    #[tracing::instrument(skip(self, log), fields(saga_id = %log.saga_id))]
    async fn save(&self, log: &SagaLog) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO saga_logs (saga_id, saga_type, status, steps, context, failure_reason, started_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (saga_id) DO UPDATE SET
                saga_type = EXCLUDED.saga_type,
                status = EXCLUDED.status,
                steps = EXCLUDED.steps,
                context = EXCLUDED.context,
                failure_reason = EXCLUDED.failure_reason,
                started_at = EXCLUDED.started_at,
                completed_at = EXCLUDED.completed_at
            "#,
        )
        .bind(&log.saga_id)
        .bind(&log.saga_type)
        .bind(log.status.as_str())
        .bind(serde_json::to_value(&log.steps)?)
        .bind(serde_json::to_value(&log.context)?)
        .bind(&log.failure_reason)
        .bind(log.started_at)
        .bind(log.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, saga_id: &str) -> Result<Option<SagaLog>> {
        let sql = format!("SELECT {SAGA_COLUMNS} FROM saga_logs WHERE saga_id = $1");
        let row = sqlx::query(&sql)
            .bind(saga_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_log).transpose()
    }

    async fn update_status(&self, saga_id: &str, status: SagaStatus) -> Result<()> {
        let completed_at = status.is_terminal().then(Utc::now);
        let result = sqlx::query(
            r#"
            UPDATE saga_logs
            SET status = $2, completed_at = COALESCE($3, completed_at)
            WHERE saga_id = $1
            "#,
        )
        .bind(saga_id)
        .bind(status.as_str())
        .bind(completed_at)
        .execute(&self.pool)
        .await?;
        Self::ensure_updated(saga_id, result.rows_affected())
    }

    async fn update_step(&self, saga_id: &str, index: usize, step: &StepLog) -> Result<()> {
        // jsonb_set only replaces an existing element; an out-of-range index
        // leaves the array unchanged, so check the length in the WHERE clause.
        let path = vec![index.to_string()];
        let result = sqlx::query(
            r#"
            UPDATE saga_logs
            SET steps = jsonb_set(steps, $2, $3, false)
            WHERE saga_id = $1 AND jsonb_array_length(steps) > $4
            "#,
        )
        .bind(saga_id)
        .bind(&path)
        .bind(serde_json::to_value(step)?)
        .bind(index as i32)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.find_by_id(saga_id).await? {
                Some(_) => Err(SagaError::Step(format!(
                    "Saga {saga_id} has no step at index {index}"
                ))),
                None => Err(SagaError::NotFound(saga_id.to_string())),
            };
        }
        Ok(())
    }

    async fn update_context(&self, saga_id: &str, context: &SagaContext) -> Result<()> {
        let result = sqlx::query("UPDATE saga_logs SET context = $2 WHERE saga_id = $1")
            .bind(saga_id)
            .bind(serde_json::to_value(context)?)
            .execute(&self.pool)
            .await?;
        Self::ensure_updated(saga_id, result.rows_affected())
    }

    async fn update_failure_reason(&self, saga_id: &str, reason: &str) -> Result<()> {
        let result = sqlx::query("UPDATE saga_logs SET failure_reason = $2 WHERE saga_id = $1")
            .bind(saga_id)
            .bind(reason)
            .execute(&self.pool)
            .await?;
        Self::ensure_updated(saga_id, result.rows_affected())
    }
}
