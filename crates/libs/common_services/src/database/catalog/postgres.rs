use super::CatalogRepository;
use crate::database::DbError;
use crate::utils::new_record_id;
use async_trait::async_trait;
use chrono::Utc;
use common_types::{ModelRecord, MoleculeRecord, NewModel, NewMolecule, TrainedModelUpdate};
use serde_json::Value;
use sqlx::PgPool;

const MODEL_COLUMNS: &str = "id, name, description, project_id, is_trained, model_path, \
     training_config, training_metrics, cg_molecule_id, atomistic_molecule_id, trained_at, \
     training_duration_seconds, created_at, updated_at";

const MOLECULE_COLUMNS: &str = "id, name, description, project_id, molecule_type, file_format, \
     file_path, coordinates_path, n_atoms, n_frames, source_molecule_id, created_at";

#[derive(Debug, Clone)]
pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn find_model(&self, model_id: &str) -> Result<ModelRecord, DbError> {
        let query = format!("SELECT {MODEL_COLUMNS} FROM backmap_models WHERE id = $1");
        sqlx::query_as::<_, ModelRecord>(&query)
            .bind(model_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Model", model_id))
    }

    async fn create_model(&self, new_model: NewModel) -> Result<ModelRecord, DbError> {
        let query = format!(
            r"
            INSERT INTO backmap_models (id, name, description, project_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {MODEL_COLUMNS}
            "
        );
        Ok(sqlx::query_as::<_, ModelRecord>(&query)
            .bind(new_record_id())
            .bind(new_model.name)
            .bind(new_model.description)
            .bind(new_model.project_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn assign_training_inputs(
        &self,
        model_id: &str,
        cg_molecule_id: &str,
        atomistic_molecule_id: &str,
        training_config: Value,
    ) -> Result<ModelRecord, DbError> {
        let query = format!(
            r"
            UPDATE backmap_models
            SET cg_molecule_id = $2,
                atomistic_molecule_id = $3,
                training_config = $4,
                updated_at = now()
            WHERE id = $1
            RETURNING {MODEL_COLUMNS}
            "
        );
        sqlx::query_as::<_, ModelRecord>(&query)
            .bind(model_id)
            .bind(cg_molecule_id)
            .bind(atomistic_molecule_id)
            .bind(training_config)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Model", model_id))
    }

    async fn mark_model_trained(
        &self,
        model_id: &str,
        update: TrainedModelUpdate,
    ) -> Result<ModelRecord, DbError> {
        let query = format!(
            r"
            UPDATE backmap_models
            SET is_trained = TRUE,
                model_path = $2,
                trained_at = $3,
                training_duration_seconds = $4,
                training_metrics = $5,
                updated_at = now()
            WHERE id = $1
            RETURNING {MODEL_COLUMNS}
            "
        );
        sqlx::query_as::<_, ModelRecord>(&query)
            .bind(model_id)
            .bind(update.model_path)
            .bind(update.trained_at)
            .bind(update.training_duration_seconds)
            .bind(update.training_metrics)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Model", model_id))
    }

    async fn find_molecule(&self, molecule_id: &str) -> Result<MoleculeRecord, DbError> {
        let query = format!("SELECT {MOLECULE_COLUMNS} FROM molecules WHERE id = $1");
        sqlx::query_as::<_, MoleculeRecord>(&query)
            .bind(molecule_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Molecule", molecule_id))
    }

    async fn create_molecule(&self, new_molecule: NewMolecule) -> Result<MoleculeRecord, DbError> {
        let query = format!(
            r"
            INSERT INTO molecules (id, name, description, project_id, molecule_type, file_format,
                                   file_path, coordinates_path, n_atoms, n_frames,
                                   source_molecule_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {MOLECULE_COLUMNS}
            "
        );
        let record = new_molecule.into_record(new_record_id(), Utc::now());
        Ok(sqlx::query_as::<_, MoleculeRecord>(&query)
            .bind(record.id)
            .bind(record.name)
            .bind(record.description)
            .bind(record.project_id)
            .bind(record.molecule_type)
            .bind(record.file_format)
            .bind(record.file_path)
            .bind(record.coordinates_path)
            .bind(record.n_atoms)
            .bind(record.n_frames)
            .bind(record.source_molecule_id)
            .bind(record.created_at)
            .fetch_one(&self.pool)
            .await?)
    }
}
