use super::{ClaimedJob, JobFilter, JobRepository};
use crate::database::DbError;
use crate::utils::new_record_id;
use async_trait::async_trait;
use chrono::Utc;
use common_types::{Job, JobEvent, JobStatus, NewJob, TaskPayload};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

struct StoredJob {
    /// Insertion order, breaks ties between equal `created_at` values.
    seq: u64,
    job: Job,
    payload: Option<TaskPayload>,
    claimed_by: Option<String>,
    attempts: i32,
}

#[derive(Default)]
struct MemoryJobs {
    next_seq: u64,
    jobs: HashMap<String, StoredJob>,
}

/// Job repository kept in process memory. Used by tests and single-process runs.
#[derive(Default)]
pub struct MemoryJobRepository {
    state: Mutex<MemoryJobs>,
}

impl MemoryJobRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The worker that claimed `job_id`, if any.
    pub async fn claimed_by(&self, job_id: &str) -> Option<String> {
        let state = self.state.lock().await;
        state.jobs.get(job_id).and_then(|s| s.claimed_by.clone())
    }
}

#[async_trait]
impl JobRepository for MemoryJobRepository {
    async fn create(&self, new_job: NewJob) -> Result<Job, DbError> {
        let job = new_job.into_job(new_record_id(), Utc::now());
        let mut state = self.state.lock().await;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.jobs.insert(
            job.id.clone(),
            StoredJob {
                seq,
                job: job.clone(),
                payload: None,
                claimed_by: None,
                attempts: 0,
            },
        );
        Ok(job)
    }

    async fn find_by_id(&self, job_id: &str) -> Result<Job, DbError> {
        let state = self.state.lock().await;
        state
            .jobs
            .get(job_id)
            .map(|s| s.job.clone())
            .ok_or_else(|| DbError::not_found("Job", job_id))
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, DbError> {
        let state = self.state.lock().await;
        let mut matching: Vec<&StoredJob> = state
            .jobs
            .values()
            .filter(|s| filter.matches(&s.job))
            .collect();
        matching.sort_by(|a, b| {
            b.job
                .created_at
                .cmp(&a.job.created_at)
                .then(b.seq.cmp(&a.seq))
        });

        Ok(matching
            .into_iter()
            .skip(filter.effective_offset() as usize)
            .take(filter.effective_limit() as usize)
            .map(|s| s.job.clone())
            .collect())
    }

    async fn enqueue(&self, job_id: &str, payload: &TaskPayload) -> Result<Job, DbError> {
        let mut state = self.state.lock().await;
        let stored = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| DbError::not_found("Job", job_id))?;
        stored.job.apply(JobEvent::Enqueued, Utc::now())?;
        stored.payload = Some(payload.clone());
        Ok(stored.job.clone())
    }

    async fn claim_next(&self, worker_id: &str) -> Result<Option<ClaimedJob>, DbError> {
        let mut state = self.state.lock().await;
        let candidate = state
            .jobs
            .values_mut()
            .filter(|s| {
                s.job.status == JobStatus::Queued && s.claimed_by.is_none() && s.payload.is_some()
            })
            .min_by(|a, b| {
                a.job
                    .created_at
                    .cmp(&b.job.created_at)
                    .then(a.seq.cmp(&b.seq))
            });

        let Some(stored) = candidate else {
            return Ok(None);
        };
        let Some(payload) = stored.payload.clone() else {
            return Ok(None);
        };
        stored.claimed_by = Some(worker_id.to_owned());
        stored.attempts += 1;
        debug!("Worker {worker_id} claimed job {}", stored.job.id);

        Ok(Some(ClaimedJob {
            job_id: stored.job.id.clone(),
            payload,
            attempts: stored.attempts,
        }))
    }

    async fn apply_event(&self, job_id: &str, event: JobEvent) -> Result<Job, DbError> {
        let mut state = self.state.lock().await;
        let stored = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| DbError::not_found("Job", job_id))?;
        stored.job.apply(event, Utc::now())?;
        Ok(stored.job.clone())
    }
}
