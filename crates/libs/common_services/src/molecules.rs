//! Turns backmapped coordinates into a catalogued molecule with its own artifacts.

use crate::database::{CatalogRepository, DbError};
use crate::storage::{ArtifactStore, StorageError, paths};
use crate::utils::new_record_id;
use bon::builder;
use common_types::{FileFormat, MoleculeRecord, MoleculeType, NewMolecule};
use ndarray::Array3;
use structure_io::{CodecRegistry, MolecularStructure, StructureError};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum MoleculeError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Default display name of a derived molecule.
#[must_use]
pub fn backmapped_name(source_name: Option<&str>) -> String {
    format!("Backmapped from {}", source_name.unwrap_or("inference"))
}

#[must_use]
pub fn backmapped_description(job_id: &str) -> String {
    let short: String = job_id.chars().take(8).collect();
    format!("Backmapped structure from inference job {short}")
}

/// Writes the structure file and coordinate array of a new backmapped
/// molecule, then registers it in the catalog.
///
/// Atom naming is copied from `template_structure_path` when it loads and has
/// the same atom count as `coordinates`; otherwise placeholder names are used.
#[builder]
pub async fn derive_backmapped_molecule(
    #[builder(start_fn)] catalog: &dyn CatalogRepository,
    #[builder(start_fn)] store: &dyn ArtifactStore,
    #[builder(start_fn)] codecs: &CodecRegistry,
    coordinates: Array3<f64>,
    #[builder(into)] project_id: String,
    #[builder(into)] job_id: String,
    #[builder(into)] source_molecule_id: Option<String>,
    #[builder(into)] template_structure_path: Option<String>,
    #[builder(into)] name: Option<String>,
) -> Result<MoleculeRecord, MoleculeError> {
    let source = match &source_molecule_id {
        Some(id) => match catalog.find_molecule(id).await {
            Ok(molecule) => Some(molecule),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        },
        None => None,
    };
    let name = name.unwrap_or_else(|| backmapped_name(source.as_ref().map(|m| m.name.as_str())));

    let (n_frames, n_atoms, _) = coordinates.dim();
    let structure = match template_structure_path {
        Some(path) => match load_template(store, codecs, &path).await {
            Ok(template) => MolecularStructure::with_template(&template, coordinates.clone())
                .or_else(|e| {
                    warn!("Template {path} does not fit the output, using placeholders: {e}");
                    MolecularStructure::placeholder(coordinates.clone())
                })?,
            Err(e) => {
                warn!("Could not load template {path}, using placeholders: {e}");
                MolecularStructure::placeholder(coordinates.clone())?
            }
        },
        None => MolecularStructure::placeholder(coordinates.clone())?,
    };

    let molecule_id = new_record_id();
    let file_path = paths::molecule_structure_path(&project_id, &molecule_id, FileFormat::Pdb);
    let text = codecs.for_format(FileFormat::Pdb)?.render_text(&structure);
    store.save_bytes(&file_path, text.into_bytes()).await?;
    let coordinates_path = store
        .save_array(
            &paths::molecule_coordinates_path(&project_id, &molecule_id),
            coordinates.view().into_dyn(),
        )
        .await?;
    debug!("Wrote derived structure {file_path} and {coordinates_path}");

    let molecule = catalog
        .create_molecule(
            NewMolecule::builder()
                .id(molecule_id)
                .name(name)
                .description(backmapped_description(&job_id))
                .project_id(project_id)
                .molecule_type(MoleculeType::Backmapped)
                .file_format(FileFormat::Pdb)
                .file_path(file_path)
                .coordinates_path(coordinates_path)
                .n_atoms(n_atoms as i32)
                .n_frames(n_frames as i32)
                .maybe_source_molecule_id(source_molecule_id)
                .build(),
        )
        .await?;
    info!("Created backmapped molecule {} from job {job_id}", molecule.id);
    Ok(molecule)
}

async fn load_template(
    store: &dyn ArtifactStore,
    codecs: &CodecRegistry,
    path: &str,
) -> Result<MolecularStructure, MoleculeError> {
    let codec = codecs.for_path(path)?;
    let bytes = store.load_bytes(path).await?;
    Ok(codec.parse_bytes(&bytes)?)
}
