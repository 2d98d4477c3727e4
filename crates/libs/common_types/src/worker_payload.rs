use serde::{Deserialize, Serialize};

/// Switches forwarded to the transform model at training time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackmapOptions {
    /// Dimensionality reduction before the core fit.
    pub pca: bool,
    /// Geometry refinement of the generated structure.
    pub refine: bool,
    /// Estimate terminal atom positions separately.
    pub shave: bool,
    /// Replace the core regression step with triangulation.
    pub triangulate: bool,
}

impl Default for BackmapOptions {
    fn default() -> Self {
        Self {
            pca: false,
            refine: true,
            shave: true,
            triangulate: false,
        }
    }
}

/// Arguments of the training task, in submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingTaskArgs {
    pub job_id: String,
    pub cg_coordinates_path: String,
    pub atomistic_coordinates_path: String,
    pub model_id: String,
    #[serde(default)]
    pub options: BackmapOptions,
}

/// Arguments of the inference task, in submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceTaskArgs {
    pub job_id: String,
    pub model_path: String,
    pub input_coordinates_path: String,
    pub output_path: String,
    pub source_molecule_id: String,
    pub project_id: String,
    pub template_structure_path: Option<String>,
    /// When set, the output is also materialized as a new backmapped molecule.
    #[serde(default = "default_derive_molecule")]
    pub derive_molecule: bool,
}

const fn default_derive_molecule() -> bool {
    true
}

/// What gets put on the queue: a task name plus its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", content = "args", rename_all = "snake_case")]
pub enum TaskPayload {
    TrainBackmappingModel(TrainingTaskArgs),
    RunInference(InferenceTaskArgs),
}

impl TaskPayload {
    #[must_use]
    pub fn job_id(&self) -> &str {
        match self {
            Self::TrainBackmappingModel(args) => &args.job_id,
            Self::RunInference(args) => &args.job_id,
        }
    }

    #[must_use]
    pub const fn task_name(&self) -> &'static str {
        match self {
            Self::TrainBackmappingModel(_) => "train_backmapping_model",
            Self::RunInference(_) => "run_inference",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_is_tagged_with_task_name() {
        let payload = TaskPayload::TrainBackmappingModel(TrainingTaskArgs {
            job_id: "j".into(),
            cg_coordinates_path: "cg.npy".into(),
            atomistic_coordinates_path: "aa.npy".into(),
            model_id: "m".into(),
            options: BackmapOptions::default(),
        });
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["task"], payload.task_name());
        assert_eq!(value["args"]["model_id"], "m");
        assert_eq!(payload.job_id(), "j");
    }

    #[test]
    fn inference_args_default_to_deriving_a_molecule() {
        let payload: TaskPayload = serde_json::from_value(json!({
            "task": "run_inference",
            "args": {
                "job_id": "j",
                "model_path": "models/m/model.json",
                "input_coordinates_path": "in.npy",
                "output_path": "out.npy",
                "source_molecule_id": "s",
                "project_id": "p",
                "template_structure_path": null
            }
        }))
        .unwrap();

        let TaskPayload::RunInference(args) = payload else {
            panic!("expected inference payload");
        };
        assert!(args.derive_molecule);
    }

    #[test]
    fn missing_options_fall_back_to_defaults() {
        let options: BackmapOptions = serde_json::from_value(json!({ "pca": true })).unwrap();
        assert!(options.pca);
        assert!(options.refine);
        assert!(options.shave);
        assert!(!options.triangulate);
    }
}
