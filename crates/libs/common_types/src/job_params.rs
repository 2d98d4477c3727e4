use crate::{BackmapOptions, Job, JobType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// Typed views over the open-ended `input_params` / `output_params` columns.
// Unknown keys survive a round trip through `extra`.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingInput {
    pub cg_molecule_id: String,
    pub atomistic_molecule_id: String,
    #[serde(default)]
    pub options: BackmapOptions,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceInput {
    pub input_molecule_id: String,
    pub output_file_path: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobInput {
    Training(TrainingInput),
    Inference(InferenceInput),
    FileProcessing(Map<String, Value>),
}

impl JobInput {
    pub fn from_value(job_type: JobType, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match job_type {
            JobType::Training => Self::Training(serde_json::from_value(value)?),
            JobType::Inference => Self::Inference(serde_json::from_value(value)?),
            JobType::FileProcessing => Self::FileProcessing(serde_json::from_value(value)?),
        })
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Training(input) => serde_json::to_value(input),
            Self::Inference(input) => serde_json::to_value(input),
            Self::FileProcessing(map) => Ok(Value::Object(map.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingOutput {
    pub model_path: String,
    pub training_duration_seconds: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceOutput {
    pub output_path: String,
    pub n_frames: usize,
    pub n_atoms: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub molecule_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutput {
    Training(TrainingOutput),
    Inference(InferenceOutput),
    FileProcessing(Map<String, Value>),
}

impl JobOutput {
    pub fn from_value(job_type: JobType, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match job_type {
            JobType::Training => Self::Training(serde_json::from_value(value)?),
            JobType::Inference => Self::Inference(serde_json::from_value(value)?),
            JobType::FileProcessing => Self::FileProcessing(serde_json::from_value(value)?),
        })
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Training(output) => serde_json::to_value(output),
            Self::Inference(output) => serde_json::to_value(output),
            Self::FileProcessing(map) => Ok(Value::Object(map.clone())),
        }
    }
}

impl Job {
    pub fn typed_input(&self) -> Result<Option<JobInput>, serde_json::Error> {
        self.input_params
            .clone()
            .map(|value| JobInput::from_value(self.job_type, value))
            .transpose()
    }

    pub fn typed_output(&self) -> Result<Option<JobOutput>, serde_json::Error> {
        self.output_params
            .clone()
            .map(|value| JobOutput::from_value(self.job_type, value))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_input_keys_are_preserved() {
        let value = json!({
            "input_molecule_id": "mol",
            "output_file_path": "inference/p/m/u/output.npy",
            "requested_by": "dashboard"
        });
        let input = JobInput::from_value(JobType::Inference, value.clone()).unwrap();

        let JobInput::Inference(inference) = &input else {
            panic!("expected inference input");
        };
        assert_eq!(inference.extra["requested_by"], "dashboard");
        assert_eq!(input.to_value().unwrap(), value);
    }

    #[test]
    fn inference_output_omits_missing_molecule() {
        let output = InferenceOutput {
            output_path: "out.npy".into(),
            n_frames: 5,
            n_atoms: 150,
            molecule_id: None,
            extra: Map::new(),
        };
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value, json!({"output_path": "out.npy", "n_frames": 5, "n_atoms": 150}));
    }

    #[test]
    fn training_input_requires_molecule_ids() {
        let result = JobInput::from_value(JobType::Training, json!({ "options": {} }));
        assert!(result.is_err());
    }
}
