use crate::context::WorkerContext;
use crate::jobs::management::{claim_next_job, execute_claimed_job};
use app_state::AppSettings;
use color_eyre::Result;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{error, info, warn};

pub async fn create_worker(settings: AppSettings, stop_on_sleep: bool) -> Result<()> {
    let context = WorkerContext::from_settings(&settings).await?;
    info!(
        "🛠️ [Worker ID: {}] Starting with {} slots on {} storage.",
        context.worker_id,
        context.settings.concurrency,
        context.storage.backend_name()
    );
    run_worker(Arc::new(context), stop_on_sleep).await
}

/// Runs `concurrency` claim loops side by side until they all stop.
///
/// A slot that panics is reported only after every other slot has stopped.
///
/// # Errors
///
/// Returns the first panic of any slot.
pub async fn run_worker(context: Arc<WorkerContext>, stop_on_sleep: bool) -> Result<()> {
    let mut loops = JoinSet::new();
    for slot in 0..context.settings.concurrency.max(1) {
        let context = Arc::clone(&context);
        loops.spawn(async move { run_worker_loop(&context, slot, stop_on_sleep).await });
    }
    let mut first_failure = None;
    while let Some(finished) = loops.join_next().await {
        if let Err(e) = finished {
            error!("‼️ A worker slot stopped unexpectedly: {e}");
            first_failure.get_or_insert(e);
        }
    }
    match first_failure {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// The main loop of one worker slot, continuously claiming and processing jobs.
///
/// Claim errors and task failures are logged and never stop the loop; it only
/// returns when `stop_on_sleep` is set and the queue is empty.
pub async fn run_worker_loop(context: &WorkerContext, slot: usize, stop_on_sleep: bool) {
    let mut sleeping = false;

    loop {
        let claimed = match claim_next_job(context).await {
            Ok(claimed) => claimed,
            Err(e) => {
                warn!("⚠️ [slot {slot}] Could not claim a job, retrying: {e:#}");
                sleep(context.settings.poll_interval()).await;
                continue;
            }
        };
        if let Some(job) = claimed {
            sleeping = false;
            info!(
                "🐜 [slot {slot}] Picked up {} job {}",
                job.payload.task_name(),
                job.job_id
            );
            execute_claimed_job(context, &job).await;
        } else {
            if !sleeping {
                sleeping = true;
                info!("💤 [slot {slot}] No jobs, going to sleep...");
                if stop_on_sleep {
                    return;
                }
            }
            sleep(context.settings.poll_interval()).await;
        }
    }
}
