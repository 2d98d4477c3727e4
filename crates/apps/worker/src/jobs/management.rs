use crate::context::WorkerContext;
use crate::handlers::{JobResult, handle_job};
use color_eyre::Result;
use common_services::alert;
use common_services::database::ClaimedJob;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Atomically claims the next queued job for this worker.
///
/// # Errors
///
/// Returns an error if the repository cannot be reached.
pub async fn claim_next_job(context: &WorkerContext) -> Result<Option<ClaimedJob>> {
    Ok(context.jobs.claim_next(&context.worker_id).await?)
}

/// Runs a claimed job under the configured time limit.
///
/// Task failures are already recorded on the job by the handler, so they are
/// only logged here. Failed and timed-out jobs are not rescheduled.
pub async fn execute_claimed_job(context: &WorkerContext, job: &ClaimedJob) {
    let limit = context.settings.job_timeout();
    match timeout(limit, handle_job(context, job)).await {
        Ok(Ok(JobResult::Done)) => {
            info!("✅ {} finished job {}", job.payload.task_name(), job.job_id);
        }
        Ok(Ok(JobResult::Cancelled)) => {
            warn!("🛑 Job {} was cancelled while running, stopped early", job.job_id);
        }
        Ok(Err(e)) => {
            error!(
                "‼️ {} failed for job {} (attempt {}): {e:?}",
                job.payload.task_name(),
                job.job_id,
                job.attempts
            );
        }
        Err(_) => {
            alert!(
                "Job {} exceeded the {}s time limit and was abandoned, its record is left as last written.",
                job.job_id,
                limit.as_secs()
            );
        }
    }
}
