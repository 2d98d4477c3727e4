//! Submission side of the pipeline: validates requests, creates job records and
//! puts task payloads on the queue.

mod error;

pub use error::*;

use crate::database::{CatalogRepository, DbError, JobRepository};
use crate::molecules::derive_backmapped_molecule;
use crate::storage::{ArtifactStore, paths};
use bon::builder;
use common_types::{
    BackmapOptions, InferenceInput, InferenceTaskArgs, Job, JobInput, JobOutput, JobStatus,
    JobType, ModelRecord, MoleculeRecord, NewJob, TaskPayload, TrainingInput, TrainingTaskArgs,
};
use serde_json::Map;
use structure_io::CodecRegistry;
use tracing::{info, warn};
use uuid::Uuid;

/// Validates a training request and enqueues it.
///
/// # Errors
///
/// * `NotFound` if the model, either molecule or a coordinate artifact is missing.
/// * `BadRequest` if the model is already trained or a molecule has no coordinates.
#[builder]
pub async fn dispatch_training(
    #[builder(start_fn)] jobs: &dyn JobRepository,
    #[builder(start_fn)] catalog: &dyn CatalogRepository,
    #[builder(start_fn)] store: &dyn ArtifactStore,
    #[builder(into)] user_id: String,
    #[builder(into)] model_id: String,
    #[builder(into)] cg_molecule_id: String,
    #[builder(into)] atomistic_molecule_id: String,
    #[builder(default)] options: BackmapOptions,
) -> Result<Job, DispatchError> {
    let model = catalog.find_model(&model_id).await?;
    if model.is_trained {
        return Err(DispatchError::bad_request(format!(
            "Model {model_id} is already trained"
        )));
    }

    let (_, cg_path) =
        molecule_with_coordinates(catalog, store, &cg_molecule_id, &model.project_id).await?;
    let (_, atomistic_path) =
        molecule_with_coordinates(catalog, store, &atomistic_molecule_id, &model.project_id)
            .await?;

    catalog
        .assign_training_inputs(
            &model_id,
            &cg_molecule_id,
            &atomistic_molecule_id,
            serde_json::to_value(options)?,
        )
        .await?;

    let input = JobInput::Training(TrainingInput {
        cg_molecule_id,
        atomistic_molecule_id,
        options,
        extra: Map::new(),
    });
    let job = jobs
        .create(
            NewJob::builder(JobType::Training)
                .user_id(user_id)
                .project_id(&model.project_id)
                .model_id(&model_id)
                .input_params(input.to_value()?)
                .build(),
        )
        .await?;

    let payload = TaskPayload::TrainBackmappingModel(TrainingTaskArgs {
        job_id: job.id.clone(),
        cg_coordinates_path: cg_path,
        atomistic_coordinates_path: atomistic_path,
        model_id,
        options,
    });
    Ok(jobs.enqueue(&job.id, &payload).await?)
}

/// Validates an inference request, allocates its output path and enqueues it.
///
/// # Errors
///
/// * `NotFound` if the model, the input molecule or its coordinates are missing.
/// * `BadRequest` if the model is not trained yet.
#[builder]
pub async fn dispatch_inference(
    #[builder(start_fn)] jobs: &dyn JobRepository,
    #[builder(start_fn)] catalog: &dyn CatalogRepository,
    #[builder(start_fn)] store: &dyn ArtifactStore,
    #[builder(into)] user_id: String,
    #[builder(into)] model_id: String,
    #[builder(into)] input_molecule_id: String,
    #[builder(default = true)] derive_molecule: bool,
) -> Result<Job, DispatchError> {
    let model = catalog.find_model(&model_id).await?;
    let Some(model_path) = model.model_path.clone().filter(|_| model.is_trained) else {
        return Err(DispatchError::bad_request(format!(
            "Model {model_id} is not trained"
        )));
    };
    let project_id = model.project_id.clone();

    let (source, input_path) =
        molecule_with_coordinates(catalog, store, &input_molecule_id, &project_id).await?;

    let template_structure_path = template_structure_path(catalog, &model).await;

    let output_path =
        paths::inference_output_path(&project_id, &model_id, &Uuid::new_v4().to_string());

    let input = JobInput::Inference(InferenceInput {
        input_molecule_id: source.id.clone(),
        output_file_path: output_path.clone(),
        extra: Map::new(),
    });
    let job = jobs
        .create(
            NewJob::builder(JobType::Inference)
                .user_id(user_id)
                .project_id(&project_id)
                .model_id(&model_id)
                .input_params(input.to_value()?)
                .build(),
        )
        .await?;

    let payload = TaskPayload::RunInference(InferenceTaskArgs {
        job_id: job.id.clone(),
        model_path,
        input_coordinates_path: input_path,
        output_path,
        source_molecule_id: source.id,
        project_id,
        template_structure_path,
        derive_molecule,
    });
    Ok(jobs.enqueue(&job.id, &payload).await?)
}

/// Cancels a job that has not reached a terminal state.
///
/// # Errors
///
/// `InvalidStateTransition` if the job is already completed, failed or cancelled.
pub async fn cancel_job(jobs: &dyn JobRepository, job_id: &str) -> Result<Job, DispatchError> {
    match jobs.cancel(job_id).await {
        Ok(job) => {
            info!("Cancelled job {job_id}");
            Ok(job)
        }
        Err(DbError::InvalidStateTransition(e)) => {
            let common_types::TransitionError::InvalidStateTransition { from, .. } = &e;
            warn!("Cannot cancel job {job_id} with status: {from}");
            Err(DispatchError::InvalidStateTransition(e))
        }
        Err(e) => Err(e.into()),
    }
}

/// Returns the raw output array bytes of a completed inference job.
pub async fn load_inference_result(
    jobs: &dyn JobRepository,
    store: &dyn ArtifactStore,
    job_id: &str,
) -> Result<Vec<u8>, DispatchError> {
    let job = jobs.find_by_id(job_id).await?;
    if job.job_type != JobType::Inference {
        return Err(DispatchError::bad_request(format!(
            "Job {job_id} is not an inference job"
        )));
    }
    if job.status != JobStatus::Completed {
        return Err(DispatchError::bad_request(format!(
            "Job {job_id} is not completed (status: {})",
            job.status
        )));
    }
    let Some(JobOutput::Inference(output)) = job.typed_output()? else {
        return Err(DispatchError::NotFound {
            entity: "Inference output",
            id: job_id.to_owned(),
        });
    };

    Ok(store
        .load_bytes(&paths::array_path(&output.output_path))
        .await?)
}

/// Registers the output of a completed inference job as a new backmapped molecule.
///
/// # Errors
///
/// * `BadRequest` if the job is not a completed inference job or has no source molecule.
/// * `NotFound` if the job or its output artifact is missing.
#[builder]
pub async fn create_molecule_from_job(
    #[builder(start_fn)] jobs: &dyn JobRepository,
    #[builder(start_fn)] catalog: &dyn CatalogRepository,
    #[builder(start_fn)] store: &dyn ArtifactStore,
    #[builder(start_fn)] codecs: &CodecRegistry,
    #[builder(into)] job_id: String,
    #[builder(into)] name: Option<String>,
) -> Result<MoleculeRecord, DispatchError> {
    let job = jobs.find_by_id(&job_id).await?;
    if job.status != JobStatus::Completed {
        return Err(DispatchError::bad_request("Job is not completed"));
    }
    if job.job_type != JobType::Inference {
        return Err(DispatchError::bad_request(
            "Only inference jobs can create molecules",
        ));
    }
    let Some(JobOutput::Inference(output)) = job.typed_output()? else {
        return Err(DispatchError::NotFound {
            entity: "Inference output",
            id: job_id,
        });
    };
    let Some(JobInput::Inference(input)) = job.typed_input()? else {
        return Err(DispatchError::bad_request("Cannot determine source molecule"));
    };

    let coordinates = store.load_coordinates(&output.output_path).await?;
    let template = match &job.model_id {
        Some(model_id) => match catalog.find_model(model_id).await {
            Ok(model) => template_structure_path(catalog, &model).await,
            Err(e) => {
                warn!("Model {model_id} of job {job_id} is gone: {e}");
                None
            }
        },
        None => None,
    };

    Ok(derive_backmapped_molecule(catalog, store, codecs)
        .coordinates(coordinates)
        .project_id(job.project_id)
        .job_id(job.id)
        .source_molecule_id(input.input_molecule_id)
        .maybe_template_structure_path(template)
        .maybe_name(name)
        .call()
        .await?)
}

/// Removes a model's stored artifact. Best-effort: storage failures are logged, not raised.
///
/// Returns whether an artifact was removed.
pub async fn delete_model_artifact(
    catalog: &dyn CatalogRepository,
    store: &dyn ArtifactStore,
    model_id: &str,
) -> Result<bool, DispatchError> {
    let model = catalog.find_model(model_id).await?;
    let Some(model_path) = model.model_path else {
        return Ok(false);
    };
    match store.delete(&model_path).await {
        Ok(()) => {
            info!("Deleted model artifact {model_path}");
            Ok(true)
        }
        Err(e) => {
            warn!("Failed to delete model artifact {model_path}: {e}");
            Ok(false)
        }
    }
}

/// Atom naming for derived structures comes from the molecule the model was trained on.
async fn template_structure_path(
    catalog: &dyn CatalogRepository,
    model: &ModelRecord,
) -> Option<String> {
    let id = model.atomistic_molecule_id.as_deref()?;
    match catalog.find_molecule(id).await {
        Ok(molecule) => Some(molecule.file_path),
        Err(e) => {
            warn!("No template structure for model {}: {e}", model.id);
            None
        }
    }
}

async fn molecule_with_coordinates(
    catalog: &dyn CatalogRepository,
    store: &dyn ArtifactStore,
    molecule_id: &str,
    project_id: &str,
) -> Result<(MoleculeRecord, String), DispatchError> {
    let molecule = catalog.find_molecule(molecule_id).await?;
    if molecule.project_id != project_id {
        return Err(DispatchError::NotFound {
            entity: "Molecule",
            id: molecule_id.to_owned(),
        });
    }
    let Some(path) = molecule.coordinates_path.clone() else {
        return Err(DispatchError::bad_request(format!(
            "Molecule {molecule_id} has no coordinates"
        )));
    };
    if !store.exists(&paths::array_path(&path)).await? {
        return Err(DispatchError::NotFound {
            entity: "Artifact",
            id: path,
        });
    }
    Ok((molecule, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MemoryCatalogRepository, MemoryJobRepository};
    use crate::storage::LocalArtifactStore;
    use chrono::Utc;
    use color_eyre::Result;
    use common_types::{
        FileFormat, MoleculeType, NewModel, NewMolecule, TrainedModelUpdate,
    };
    use ndarray::Array3;
    use serde_json::json;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        jobs: MemoryJobRepository,
        catalog: MemoryCatalogRepository,
        store: LocalArtifactStore,
        model_id: String,
        cg_id: String,
        atomistic_id: String,
    }

    async fn molecule(
        catalog: &MemoryCatalogRepository,
        store: &LocalArtifactStore,
        project_id: &str,
        molecule_type: MoleculeType,
        n_atoms: usize,
    ) -> Result<String> {
        let id = crate::utils::new_record_id();
        let coordinates_path = paths::molecule_coordinates_path(project_id, &id);
        store
            .save_array(
                &coordinates_path,
                Array3::<f64>::zeros((2, n_atoms, 3)).view().into_dyn(),
            )
            .await?;
        catalog
            .create_molecule(
                NewMolecule::builder()
                    .id(id.clone())
                    .name("mol")
                    .project_id(project_id)
                    .molecule_type(molecule_type)
                    .file_format(FileFormat::Pdb)
                    .file_path(paths::molecule_structure_path(project_id, &id, FileFormat::Pdb))
                    .coordinates_path(coordinates_path)
                    .n_atoms(n_atoms as i32)
                    .build(),
            )
            .await?;
        Ok(id)
    }

    async fn fixture() -> Result<Fixture> {
        let dir = tempfile::tempdir()?;
        let store = LocalArtifactStore::new(dir.path());
        let catalog = MemoryCatalogRepository::new();
        let model = catalog
            .create_model(NewModel::builder().name("model").project_id("proj").build())
            .await?;
        let cg_id = molecule(&catalog, &store, "proj", MoleculeType::CoarseGrained, 4).await?;
        let atomistic_id = molecule(&catalog, &store, "proj", MoleculeType::Atomistic, 12).await?;
        Ok(Fixture {
            _dir: dir,
            jobs: MemoryJobRepository::new(),
            catalog,
            store,
            model_id: model.id,
            cg_id,
            atomistic_id,
        })
    }

    async fn train(f: &Fixture) -> Result<()> {
        f.catalog
            .assign_training_inputs(&f.model_id, &f.cg_id, &f.atomistic_id, json!({}))
            .await?;
        f.catalog
            .mark_model_trained(
                &f.model_id,
                TrainedModelUpdate {
                    model_path: paths::model_artifact_path(&f.model_id),
                    trained_at: Utc::now(),
                    training_duration_seconds: 0.1,
                    training_metrics: json!({}),
                },
            )
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn training_dispatch_queues_payload() -> Result<()> {
        // ARRANGE
        let f = fixture().await?;

        // ACT
        let job = dispatch_training(&f.jobs, &f.catalog, &f.store)
            .user_id("user")
            .model_id(&f.model_id)
            .cg_molecule_id(&f.cg_id)
            .atomistic_molecule_id(&f.atomistic_id)
            .call()
            .await?;

        // ASSERT
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.project_id, "proj");
        let claimed = f.jobs.claim_next("w").await?;
        let Some(claimed) = claimed else {
            panic!("nothing queued");
        };
        let TaskPayload::TrainBackmappingModel(args) = claimed.payload else {
            panic!("wrong task");
        };
        assert_eq!(args.job_id, job.id);
        assert_eq!(args.options, BackmapOptions::default());
        assert!(args.cg_coordinates_path.ends_with("coordinates.npy"));
        let model = f.catalog.find_model(&f.model_id).await?;
        assert_eq!(model.cg_molecule_id.as_deref(), Some(f.cg_id.as_str()));
        assert!(model.training_config.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn training_rejects_trained_model_and_missing_molecule() -> Result<()> {
        let f = fixture().await?;

        let missing = dispatch_training(&f.jobs, &f.catalog, &f.store)
            .user_id("user")
            .model_id(&f.model_id)
            .cg_molecule_id("nope")
            .atomistic_molecule_id(&f.atomistic_id)
            .call()
            .await;
        assert!(matches!(missing, Err(DispatchError::NotFound { .. })));

        train(&f).await?;
        let trained = dispatch_training(&f.jobs, &f.catalog, &f.store)
            .user_id("user")
            .model_id(&f.model_id)
            .cg_molecule_id(&f.cg_id)
            .atomistic_molecule_id(&f.atomistic_id)
            .call()
            .await;
        assert!(matches!(trained, Err(DispatchError::BadRequest(_))));
        assert!(f.jobs.list(&Default::default()).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn inference_requires_trained_model() -> Result<()> {
        let f = fixture().await?;

        let result = dispatch_inference(&f.jobs, &f.catalog, &f.store)
            .user_id("user")
            .model_id(&f.model_id)
            .input_molecule_id(&f.cg_id)
            .call()
            .await;

        assert!(result.is_err_and(|e| e.is_client_error()));
        Ok(())
    }

    #[tokio::test]
    async fn inference_dispatch_allocates_output_and_template() -> Result<()> {
        let f = fixture().await?;
        train(&f).await?;

        let job = dispatch_inference(&f.jobs, &f.catalog, &f.store)
            .user_id("user")
            .model_id(&f.model_id)
            .input_molecule_id(&f.cg_id)
            .call()
            .await?;

        let Some(claimed) = f.jobs.claim_next("w").await? else {
            panic!("nothing queued");
        };
        let TaskPayload::RunInference(args) = claimed.payload else {
            panic!("wrong task");
        };
        let prefix = format!("inference/proj/{}/", f.model_id);
        assert!(args.output_path.starts_with(&prefix));
        assert!(args.output_path.ends_with("/output.npy"));
        assert_eq!(
            args.template_structure_path,
            Some(paths::molecule_structure_path("proj", &f.atomistic_id, FileFormat::Pdb))
        );
        assert!(args.derive_molecule);
        let Some(JobInput::Inference(input)) = job.typed_input()? else {
            panic!("missing input params");
        };
        assert_eq!(input.output_file_path, args.output_path);
        Ok(())
    }

    #[tokio::test]
    async fn molecules_from_other_projects_are_not_found() -> Result<()> {
        let f = fixture().await?;
        let foreign = molecule(&f.catalog, &f.store, "other", MoleculeType::CoarseGrained, 4).await?;

        let result = dispatch_training(&f.jobs, &f.catalog, &f.store)
            .user_id("user")
            .model_id(&f.model_id)
            .cg_molecule_id(foreign)
            .atomistic_molecule_id(&f.atomistic_id)
            .call()
            .await;

        assert!(matches!(result, Err(DispatchError::NotFound { entity: "Molecule", .. })));
        Ok(())
    }

    #[tokio::test]
    async fn cancel_twice_is_invalid() -> Result<()> {
        let f = fixture().await?;
        let job = dispatch_training(&f.jobs, &f.catalog, &f.store)
            .user_id("user")
            .model_id(&f.model_id)
            .cg_molecule_id(&f.cg_id)
            .atomistic_molecule_id(&f.atomistic_id)
            .call()
            .await?;

        let first = cancel_job(&f.jobs, &job.id).await?;
        let second = cancel_job(&f.jobs, &job.id).await;

        assert_eq!(first.status, JobStatus::Cancelled);
        assert!(matches!(second, Err(DispatchError::InvalidStateTransition(_))));
        Ok(())
    }

    #[tokio::test]
    async fn result_download_requires_completed_inference() -> Result<()> {
        let f = fixture().await?;
        train(&f).await?;
        let job = dispatch_inference(&f.jobs, &f.catalog, &f.store)
            .user_id("user")
            .model_id(&f.model_id)
            .input_molecule_id(&f.cg_id)
            .call()
            .await?;

        let early = load_inference_result(&f.jobs, &f.store, &job.id).await;
        assert!(matches!(early, Err(DispatchError::BadRequest(_))));

        f.store.save_bytes("inference/out.npy", b"npy".to_vec()).await?;
        f.jobs.mark_running(&job.id, "loading model").await?;
        f.jobs
            .mark_completed(
                &job.id,
                json!({"output_path": "inference/out.npy", "n_frames": 2, "n_atoms": 12}),
                "done",
            )
            .await?;

        let bytes = load_inference_result(&f.jobs, &f.store, &job.id).await?;
        assert_eq!(bytes, b"npy");
        Ok(())
    }

    #[tokio::test]
    async fn completed_inference_becomes_a_molecule() -> Result<()> {
        let f = fixture().await?;
        let codecs = CodecRegistry::with_defaults();
        train(&f).await?;
        let job = dispatch_inference(&f.jobs, &f.catalog, &f.store)
            .user_id("user")
            .model_id(&f.model_id)
            .input_molecule_id(&f.cg_id)
            .call()
            .await?;

        let early = create_molecule_from_job(&f.jobs, &f.catalog, &f.store, &codecs)
            .job_id(&job.id)
            .call()
            .await;
        assert!(matches!(early, Err(DispatchError::BadRequest(_))));

        let Some(JobInput::Inference(input)) = job.typed_input()? else {
            panic!("missing input params");
        };
        f.store
            .save_array(
                &input.output_file_path,
                Array3::<f64>::ones((3, 12, 3)).view().into_dyn(),
            )
            .await?;
        f.jobs.mark_running(&job.id, "loading model").await?;
        f.jobs
            .mark_completed(
                &job.id,
                json!({"output_path": input.output_file_path, "n_frames": 3, "n_atoms": 12}),
                "done",
            )
            .await?;

        let molecule = create_molecule_from_job(&f.jobs, &f.catalog, &f.store, &codecs)
            .job_id(&job.id)
            .name("refined")
            .call()
            .await?;

        assert_eq!(molecule.name, "refined");
        assert_eq!(molecule.molecule_type, MoleculeType::Backmapped);
        assert_eq!((molecule.n_frames, molecule.n_atoms), (3, 12));
        assert_eq!(molecule.source_molecule_id.as_deref(), Some(f.cg_id.as_str()));
        assert!(f.store.exists(&molecule.file_path).await?);
        Ok(())
    }

    #[tokio::test]
    async fn training_jobs_cannot_become_molecules() -> Result<()> {
        let f = fixture().await?;
        let job = dispatch_training(&f.jobs, &f.catalog, &f.store)
            .user_id("user")
            .model_id(&f.model_id)
            .cg_molecule_id(&f.cg_id)
            .atomistic_molecule_id(&f.atomistic_id)
            .call()
            .await?;
        f.jobs.mark_running(&job.id, "loading").await?;
        f.jobs
            .mark_completed(&job.id, json!({"model_path": "m", "training_duration_seconds": 1.0}), "done")
            .await?;

        let result = create_molecule_from_job(&f.jobs, &f.catalog, &f.store, &CodecRegistry::default())
            .job_id(&job.id)
            .call()
            .await;
        assert!(matches!(result, Err(DispatchError::BadRequest(_))));
        Ok(())
    }

    #[tokio::test]
    async fn model_artifact_deletion_is_best_effort() -> Result<()> {
        let f = fixture().await?;
        assert!(!delete_model_artifact(&f.catalog, &f.store, &f.model_id).await?);

        train(&f).await?;
        let model_path = paths::model_artifact_path(&f.model_id);
        f.store.save_bytes(&model_path, b"{}".to_vec()).await?;

        assert!(delete_model_artifact(&f.catalog, &f.store, &f.model_id).await?);
        assert!(!f.store.exists(&model_path).await?);
        Ok(())
    }
}
