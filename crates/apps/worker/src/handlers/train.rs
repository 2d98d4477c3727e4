use crate::context::WorkerContext;
use crate::handlers::JobResult;
use backmapping::{BackmapAdapter, ModelError};
use chrono::Utc;
use color_eyre::Result;
use common_services::storage::paths;
use common_types::{JobOutput, TrainedModelUpdate, TrainingOutput, TrainingTaskArgs};
use serde_json::{Map, json};
use std::time::Instant;
use tokio::task::spawn_blocking;
use tracing::{debug, info};

/// Trains a backmapping model and stores it as the model's artifact.
///
/// The model is only flagged as trained once its artifact is written.
pub async fn handle(context: &WorkerContext, args: &TrainingTaskArgs) -> Result<JobResult> {
    let jobs = context.jobs.as_ref();
    let job_id = args.job_id.as_str();

    jobs.mark_running(job_id, "Loading training data...").await?;
    let cg = context
        .storage
        .load_coordinates(&args.cg_coordinates_path)
        .await?;
    let atomistic = context
        .storage
        .load_coordinates(&args.atomistic_coordinates_path)
        .await?;
    info!(
        "Loaded training data for model {}: cg {:?}, atomistic {:?}",
        args.model_id,
        cg.shape(),
        atomistic.shape()
    );
    let metrics = json!({
        "cg_shape": cg.shape(),
        "atomistic_shape": atomistic.shape(),
    });

    jobs.update_progress(job_id, 10.0, "Training backmapping model...")
        .await?;
    let options = args.options;
    let fit_job_id = args.job_id.clone();
    let started = Instant::now();
    let adapter = spawn_blocking(move || -> Result<BackmapAdapter, ModelError> {
        let mut adapter = BackmapAdapter::with_options(options);
        let mut on_progress =
            |percent: f64, message: &str| debug!("[{fit_job_id}] {percent:.0}% {message}");
        adapter.fit(cg.view(), atomistic.view(), Some(&mut on_progress))?;
        Ok(adapter)
    })
    .await??;
    let training_duration_seconds = started.elapsed().as_secs_f64();

    jobs.update_progress(job_id, 80.0, "Saving trained model...")
        .await?;
    let model_path = paths::model_artifact_path(&args.model_id);
    let bytes = context.serializer.serialize(&adapter)?;
    context.storage.save_bytes(&model_path, bytes).await?;

    context
        .catalog
        .mark_model_trained(
            &args.model_id,
            TrainedModelUpdate {
                model_path: model_path.clone(),
                trained_at: Utc::now(),
                training_duration_seconds,
                training_metrics: metrics,
            },
        )
        .await?;

    let output = JobOutput::Training(TrainingOutput {
        model_path,
        training_duration_seconds,
        extra: Map::new(),
    });
    jobs.mark_completed(job_id, output.to_value()?, "Training complete")
        .await?;
    info!(
        "Trained model {} in {training_duration_seconds:.2}s",
        args.model_id
    );
    Ok(JobResult::Done)
}
