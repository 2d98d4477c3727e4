use super::{ClaimedJob, JobFilter, JobRepository};
use crate::database::DbError;
use crate::utils::new_record_id;
use async_trait::async_trait;
use chrono::Utc;
use common_types::{Job, JobEvent, NewJob, TaskPayload};
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};

const JOB_COLUMNS: &str = "id, job_type, status, user_id, project_id, model_id, input_params, \
     output_params, progress_percent, progress_message, error_message, started_at, \
     completed_at, created_at";

/// Job repository backed by the `jobs` table. The table doubles as the task queue.
#[derive(Debug, Clone)]
pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_job(tx: &mut Transaction<'_, Postgres>, job_id: &str) -> Result<Job, DbError> {
        let query = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Job>(&query)
            .bind(job_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| DbError::not_found("Job", job_id))
    }

    /// Writes back every field the state machine may have changed.
    async fn write_state(tx: &mut Transaction<'_, Postgres>, job: &Job) -> Result<(), DbError> {
        sqlx::query(
            r"
            UPDATE jobs
            SET status = $2,
                output_params = $3,
                progress_percent = $4,
                progress_message = $5,
                error_message = $6,
                started_at = $7,
                completed_at = $8
            WHERE id = $1
            ",
        )
        .bind(&job.id)
        .bind(job.status)
        .bind(&job.output_params)
        .bind(job.progress_percent)
        .bind(&job.progress_message)
        .bind(&job.error_message)
        .bind(job.started_at)
        .bind(job.completed_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn create(&self, new_job: NewJob) -> Result<Job, DbError> {
        let query = format!(
            r"
            INSERT INTO jobs (id, job_type, status, user_id, project_id, model_id, input_params, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {JOB_COLUMNS}
            "
        );
        let job = new_job.into_job(new_record_id(), Utc::now());
        let created = sqlx::query_as::<_, Job>(&query)
            .bind(&job.id)
            .bind(job.job_type)
            .bind(job.status)
            .bind(&job.user_id)
            .bind(&job.project_id)
            .bind(&job.model_id)
            .bind(&job.input_params)
            .bind(job.created_at)
            .fetch_one(&self.pool)
            .await?;
        debug!("Created {:?} job {}", created.job_type, created.id);
        Ok(created)
    }

    async fn find_by_id(&self, job_id: &str) -> Result<Job, DbError> {
        let query = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Job", job_id))
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, DbError> {
        let query = format!(
            r"
            SELECT {JOB_COLUMNS} FROM jobs
            WHERE ($1::text IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR project_id = $2)
              AND ($3::job_status IS NULL OR status = $3)
            ORDER BY created_at DESC, id
            LIMIT $4 OFFSET $5
            "
        );
        Ok(sqlx::query_as::<_, Job>(&query)
            .bind(&filter.user_id)
            .bind(&filter.project_id)
            .bind(filter.status)
            .bind(filter.effective_limit())
            .bind(filter.effective_offset())
            .fetch_all(&self.pool)
            .await?)
    }

    async fn enqueue(&self, job_id: &str, payload: &TaskPayload) -> Result<Job, DbError> {
        let payload_json = serde_json::to_value(payload)?;
        let mut tx = self.pool.begin().await?;

        let mut job = Self::lock_job(&mut tx, job_id).await?;
        job.apply(JobEvent::Enqueued, Utc::now())?;
        Self::write_state(&mut tx, &job).await?;
        sqlx::query("UPDATE jobs SET task_payload = $2 WHERE id = $1")
            .bind(job_id)
            .bind(payload_json)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("Enqueued {} for job {}", payload.task_name(), job_id);
        Ok(job)
    }

    async fn claim_next(&self, worker_id: &str) -> Result<Option<ClaimedJob>, DbError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(String, Value, i32)> = sqlx::query_as(
            r"
            WITH candidate AS (
                SELECT id FROM jobs
                WHERE status = 'queued'
                  AND claimed_by IS NULL
                  AND task_payload IS NOT NULL
                ORDER BY created_at
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            UPDATE jobs
            SET claimed_by = $1,
                claimed_at = now(),
                attempts = attempts + 1
            WHERE id = (SELECT id FROM candidate)
            RETURNING id, task_payload, attempts
            ",
        )
        .bind(worker_id)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        let Some((job_id, payload, attempts)) = row else {
            return Ok(None);
        };
        Ok(Some(ClaimedJob {
            job_id,
            payload: serde_json::from_value(payload)?,
            attempts,
        }))
    }

    async fn apply_event(&self, job_id: &str, event: JobEvent) -> Result<Job, DbError> {
        let mut tx = self.pool.begin().await?;
        let mut job = Self::lock_job(&mut tx, job_id).await?;
        job.apply(event, Utc::now())?;
        Self::write_state(&mut tx, &job).await?;
        tx.commit().await?;
        Ok(job)
    }
}

