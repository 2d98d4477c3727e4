//! Artifact key conventions shared by the dispatcher and the worker tasks.

use common_types::FileFormat;
use std::path::Path;

pub const ARRAY_EXTENSION: &str = "npy";
pub const MODEL_FILE_NAME: &str = "model.json";

/// Appends `.npy` when `path` has no extension.
#[must_use]
pub fn array_path(path: &str) -> String {
    if Path::new(path).extension().is_some() {
        path.to_owned()
    } else {
        format!("{path}.{ARRAY_EXTENSION}")
    }
}

#[must_use]
pub fn molecule_structure_path(project_id: &str, molecule_id: &str, format: FileFormat) -> String {
    format!("molecules/{project_id}/{molecule_id}/structure.{}", format.extension())
}

#[must_use]
pub fn molecule_coordinates_path(project_id: &str, molecule_id: &str) -> String {
    format!("molecules/{project_id}/{molecule_id}/coordinates.{ARRAY_EXTENSION}")
}

#[must_use]
pub fn model_artifact_path(model_id: &str) -> String {
    format!("models/{model_id}/{MODEL_FILE_NAME}")
}

#[must_use]
pub fn inference_output_path(project_id: &str, model_id: &str, run_id: &str) -> String {
    format!("inference/{project_id}/{model_id}/{run_id}/output.{ARRAY_EXTENSION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_paths_get_npy_suffix_only_when_missing() {
        assert_eq!(array_path("inference/p/m/u/output"), "inference/p/m/u/output.npy");
        assert_eq!(array_path("inference/p/m/u/output.npy"), "inference/p/m/u/output.npy");
    }

    #[test]
    fn conventions() {
        assert_eq!(
            molecule_structure_path("p", "m", FileFormat::Pdb),
            "molecules/p/m/structure.pdb"
        );
        assert_eq!(molecule_coordinates_path("p", "m"), "molecules/p/m/coordinates.npy");
        assert_eq!(model_artifact_path("abc"), "models/abc/model.json");
    }
}
