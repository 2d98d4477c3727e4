use crate::context::WorkerContext;
use color_eyre::{Report, Result};
use common_services::database::{ClaimedJob, DbError};
use common_types::{JobStatus, TaskPayload};
use tracing::warn;

pub mod inference;
pub mod train;

/// The outcome of a job handler's execution.
#[derive(Debug, PartialEq, Eq)]
pub enum JobResult {
    Done,
    /// A status write was rejected because the job was cancelled mid-run.
    Cancelled,
}

/// Dispatches a job to its task and records failures on the job.
///
/// A failing task marks the job `failed` with the error description and then
/// returns the error, so the loop still sees it.
pub async fn handle_job(context: &WorkerContext, job: &ClaimedJob) -> Result<JobResult> {
    let result = match &job.payload {
        TaskPayload::TrainBackmappingModel(args) => train::handle(context, args).await,
        TaskPayload::RunInference(args) => inference::handle(context, args).await,
    };

    match result {
        Ok(result) => Ok(result),
        Err(e) => {
            if is_rejected_transition(&e) && was_cancelled(context, &job.job_id).await {
                return Ok(JobResult::Cancelled);
            }
            record_failure(context, &job.job_id, &e).await;
            Err(e)
        }
    }
}

fn is_rejected_transition(error: &Report) -> bool {
    error
        .downcast_ref::<DbError>()
        .is_some_and(DbError::is_invalid_transition)
}

async fn was_cancelled(context: &WorkerContext, job_id: &str) -> bool {
    context
        .jobs
        .find_by_id(job_id)
        .await
        .is_ok_and(|job| job.status == JobStatus::Cancelled)
}

async fn record_failure(context: &WorkerContext, job_id: &str, error: &Report) {
    let message = format!("{error:#}");
    if let Err(e) = context.jobs.mark_failed(job_id, &message).await {
        warn!("Could not mark job {job_id} as failed: {e}");
    }
}
