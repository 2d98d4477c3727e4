mod memory;
mod postgres;

pub use memory::*;
pub use postgres::*;

use crate::database::DbError;
use async_trait::async_trait;
use bon::Builder;
use common_types::{Job, JobEvent, JobStatus, NewJob, TaskPayload};
use serde_json::Value;

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 100;

/// Filters for listing jobs. Results are always newest first.
#[derive(Debug, Clone, Default, Builder)]
pub struct JobFilter {
    #[builder(into)]
    pub user_id: Option<String>,
    #[builder(into)]
    pub project_id: Option<String>,
    pub status: Option<JobStatus>,
    pub limit: Option<i64>,
    #[builder(default)]
    pub offset: i64,
}

impl JobFilter {
    #[must_use]
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }

    #[must_use]
    pub fn effective_offset(&self) -> i64 {
        self.offset.max(0)
    }

    #[must_use]
    pub fn matches(&self, job: &Job) -> bool {
        self.user_id.as_ref().is_none_or(|u| *u == job.user_id)
            && self.project_id.as_ref().is_none_or(|p| *p == job.project_id)
            && self.status.is_none_or(|s| s == job.status)
    }
}

/// A queued job handed to exactly one worker.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedJob {
    pub job_id: String,
    pub payload: TaskPayload,
    /// How many times this job has been claimed, including this one.
    pub attempts: i32,
}

/// Data-access channel for job records, including the queue columns.
///
/// Every status change goes through [`Job::apply`], so implementations only
/// differ in how they lock and persist the record.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, new_job: NewJob) -> Result<Job, DbError>;

    async fn find_by_id(&self, job_id: &str) -> Result<Job, DbError>;

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, DbError>;

    /// Stores the task payload and moves the job from `pending` to `queued`.
    async fn enqueue(&self, job_id: &str, payload: &TaskPayload) -> Result<Job, DbError>;

    /// Claims the oldest queued job nobody has claimed yet.
    async fn claim_next(&self, worker_id: &str) -> Result<Option<ClaimedJob>, DbError>;

    /// Applies `event` atomically with respect to other writers of the same job.
    async fn apply_event(&self, job_id: &str, event: JobEvent) -> Result<Job, DbError>;

    async fn mark_running(&self, job_id: &str, message: &str) -> Result<Job, DbError> {
        self.apply_event(
            job_id,
            JobEvent::Started {
                message: message.to_owned(),
            },
        )
        .await
    }

    async fn update_progress(
        &self,
        job_id: &str,
        percent: f64,
        message: &str,
    ) -> Result<Job, DbError> {
        self.apply_event(
            job_id,
            JobEvent::Progress {
                percent,
                message: message.to_owned(),
            },
        )
        .await
    }

    async fn mark_completed(
        &self,
        job_id: &str,
        output_params: Value,
        message: &str,
    ) -> Result<Job, DbError> {
        self.apply_event(
            job_id,
            JobEvent::Completed {
                output_params,
                message: message.to_owned(),
            },
        )
        .await
    }

    async fn mark_failed(&self, job_id: &str, error: &str) -> Result<Job, DbError> {
        self.apply_event(
            job_id,
            JobEvent::Failed {
                error: error.to_owned(),
            },
        )
        .await
    }

    async fn cancel(&self, job_id: &str) -> Result<Job, DbError> {
        self.apply_event(job_id, JobEvent::Cancelled).await
    }
}
