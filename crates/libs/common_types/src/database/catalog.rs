use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, Type};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(type_name = "molecule_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MoleculeType {
    CoarseGrained,
    Atomistic,
    Backmapped,
}

/// Molecular file formats known to the system. Not every format has a codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(type_name = "file_format", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    Pdb,
    Gro,
    Xtc,
    Dcd,
    Mol2,
    Xyz,
}

impl FileFormat {
    pub const ALL: [Self; 6] = [
        Self::Pdb,
        Self::Gro,
        Self::Xtc,
        Self::Dcd,
        Self::Mol2,
        Self::Xyz,
    ];

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Pdb => "pdb",
            Self::Gro => "gro",
            Self::Xtc => "xtc",
            Self::Dcd => "dcd",
            Self::Mol2 => "mol2",
            Self::Xyz => "xyz",
        }
    }

    /// Case-insensitive lookup, with or without the leading dot.
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.trim_start_matches('.').to_lowercase();
        Self::ALL.into_iter().find(|f| f.extension() == extension)
    }

    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Corresponds to the '`backmap_models`' table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ModelRecord {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub project_id: String,
    pub is_trained: bool,
    pub model_path: Option<String>,
    pub training_config: Option<Value>,
    pub training_metrics: Option<Value>,
    pub cg_molecule_id: Option<String>,
    pub atomistic_molecule_id: Option<String>,
    pub trained_at: Option<DateTime<Utc>>,
    pub training_duration_seconds: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Builder)]
pub struct NewModel {
    #[builder(into)]
    pub name: String,
    #[builder(into)]
    pub description: Option<String>,
    #[builder(into)]
    pub project_id: String,
}

/// Fields written once a model's artifact is durably stored.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModelUpdate {
    pub model_path: String,
    pub trained_at: DateTime<Utc>,
    pub training_duration_seconds: f64,
    pub training_metrics: Value,
}

/// Corresponds to the 'molecules' table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MoleculeRecord {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub project_id: String,
    pub molecule_type: MoleculeType,
    pub file_format: FileFormat,
    pub file_path: String,
    pub coordinates_path: Option<String>,
    pub n_atoms: i32,
    pub n_frames: i32,
    pub source_molecule_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Builder)]
pub struct NewMolecule {
    /// Callers that must know the id before writing artifacts can pick it up front.
    #[builder(into)]
    pub id: Option<String>,
    #[builder(into)]
    pub name: String,
    #[builder(into)]
    pub description: Option<String>,
    #[builder(into)]
    pub project_id: String,
    pub molecule_type: MoleculeType,
    pub file_format: FileFormat,
    #[builder(into)]
    pub file_path: String,
    #[builder(into)]
    pub coordinates_path: Option<String>,
    pub n_atoms: i32,
    #[builder(default = 1)]
    pub n_frames: i32,
    #[builder(into)]
    pub source_molecule_id: Option<String>,
}

impl NewMolecule {
    #[must_use]
    pub fn into_record(self, fallback_id: String, now: DateTime<Utc>) -> MoleculeRecord {
        MoleculeRecord {
            id: self.id.unwrap_or(fallback_id),
            name: self.name,
            description: self.description,
            project_id: self.project_id,
            molecule_type: self.molecule_type,
            file_format: self.file_format,
            file_path: self.file_path,
            coordinates_path: self.coordinates_path,
            n_atoms: self.n_atoms,
            n_frames: self.n_frames,
            source_molecule_id: self.source_molecule_id,
            created_at: now,
        }
    }
}
