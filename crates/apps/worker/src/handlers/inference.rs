use crate::context::WorkerContext;
use crate::handlers::JobResult;
use color_eyre::Result;
use common_services::molecules::derive_backmapped_molecule;
use common_types::{InferenceOutput, InferenceTaskArgs, JobOutput};
use serde_json::Map;
use tokio::task::spawn_blocking;
use tracing::info;

/// Runs a trained model on a molecule's coordinates and stores the result,
/// optionally registering it as a new backmapped molecule.
pub async fn handle(context: &WorkerContext, args: &InferenceTaskArgs) -> Result<JobResult> {
    let jobs = context.jobs.as_ref();
    let job_id = args.job_id.as_str();

    jobs.mark_running(job_id, "Loading model...").await?;
    let model_bytes = context.storage.load_bytes(&args.model_path).await?;
    let adapter = context.serializer.deserialize(&model_bytes)?;

    jobs.update_progress(job_id, 20.0, "Loading input coordinates...")
        .await?;
    let input = context
        .storage
        .load_coordinates(&args.input_coordinates_path)
        .await?;

    jobs.update_progress(job_id, 40.0, "Running inference...")
        .await?;
    let output = spawn_blocking(move || adapter.transform(input.view())).await??;
    let (n_frames, n_atoms, _) = output.dim();

    jobs.update_progress(job_id, 80.0, "Saving results...")
        .await?;
    let output_path = context
        .storage
        .save_array(&args.output_path, output.view().into_dyn())
        .await?;

    let molecule_id = if args.derive_molecule {
        jobs.update_progress(job_id, 90.0, "Creating derived molecule...")
            .await?;
        let molecule = derive_backmapped_molecule(
            context.catalog.as_ref(),
            context.storage.as_ref(),
            &context.codecs,
        )
        .coordinates(output)
        .project_id(&args.project_id)
        .job_id(job_id)
        .source_molecule_id(&args.source_molecule_id)
        .maybe_template_structure_path(args.template_structure_path.clone())
        .call()
        .await?;
        Some(molecule.id)
    } else {
        None
    };

    let result = JobOutput::Inference(InferenceOutput {
        output_path,
        n_frames,
        n_atoms,
        molecule_id,
        extra: Map::new(),
    });
    jobs.mark_completed(job_id, result.to_value()?, "Inference complete")
        .await?;
    info!("Inference job {job_id} produced {n_frames} frames of {n_atoms} atoms");
    Ok(JobResult::Done)
}
