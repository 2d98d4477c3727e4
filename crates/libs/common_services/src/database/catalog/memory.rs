use super::CatalogRepository;
use crate::database::DbError;
use crate::utils::new_record_id;
use async_trait::async_trait;
use chrono::Utc;
use common_types::{ModelRecord, MoleculeRecord, NewModel, NewMolecule, TrainedModelUpdate};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct Catalog {
    models: HashMap<String, ModelRecord>,
    molecules: HashMap<String, MoleculeRecord>,
}

#[derive(Default)]
pub struct MemoryCatalogRepository {
    state: Mutex<Catalog>,
}

impl MemoryCatalogRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn molecules_in_project(&self, project_id: &str) -> Vec<MoleculeRecord> {
        let state = self.state.lock().await;
        state
            .molecules
            .values()
            .filter(|m| m.project_id == project_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CatalogRepository for MemoryCatalogRepository {
    async fn find_model(&self, model_id: &str) -> Result<ModelRecord, DbError> {
        let state = self.state.lock().await;
        state
            .models
            .get(model_id)
            .cloned()
            .ok_or_else(|| DbError::not_found("Model", model_id))
    }

    async fn create_model(&self, new_model: NewModel) -> Result<ModelRecord, DbError> {
        let now = Utc::now();
        let model = ModelRecord {
            id: new_record_id(),
            name: new_model.name,
            description: new_model.description,
            project_id: new_model.project_id,
            is_trained: false,
            model_path: None,
            training_config: None,
            training_metrics: None,
            cg_molecule_id: None,
            atomistic_molecule_id: None,
            trained_at: None,
            training_duration_seconds: None,
            created_at: now,
            updated_at: now,
        };
        let mut state = self.state.lock().await;
        state.models.insert(model.id.clone(), model.clone());
        Ok(model)
    }

    async fn assign_training_inputs(
        &self,
        model_id: &str,
        cg_molecule_id: &str,
        atomistic_molecule_id: &str,
        training_config: Value,
    ) -> Result<ModelRecord, DbError> {
        let mut state = self.state.lock().await;
        let model = state
            .models
            .get_mut(model_id)
            .ok_or_else(|| DbError::not_found("Model", model_id))?;
        model.cg_molecule_id = Some(cg_molecule_id.to_owned());
        model.atomistic_molecule_id = Some(atomistic_molecule_id.to_owned());
        model.training_config = Some(training_config);
        model.updated_at = Utc::now();
        Ok(model.clone())
    }

    async fn mark_model_trained(
        &self,
        model_id: &str,
        update: TrainedModelUpdate,
    ) -> Result<ModelRecord, DbError> {
        let mut state = self.state.lock().await;
        let model = state
            .models
            .get_mut(model_id)
            .ok_or_else(|| DbError::not_found("Model", model_id))?;
        model.is_trained = true;
        model.model_path = Some(update.model_path);
        model.trained_at = Some(update.trained_at);
        model.training_duration_seconds = Some(update.training_duration_seconds);
        model.training_metrics = Some(update.training_metrics);
        model.updated_at = Utc::now();
        Ok(model.clone())
    }

    async fn find_molecule(&self, molecule_id: &str) -> Result<MoleculeRecord, DbError> {
        let state = self.state.lock().await;
        state
            .molecules
            .get(molecule_id)
            .cloned()
            .ok_or_else(|| DbError::not_found("Molecule", molecule_id))
    }

    async fn create_molecule(&self, new_molecule: NewMolecule) -> Result<MoleculeRecord, DbError> {
        let molecule = new_molecule.into_record(new_record_id(), Utc::now());
        let mut state = self.state.lock().await;
        state.molecules.insert(molecule.id.clone(), molecule.clone());
        Ok(molecule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::Result;
    use serde_json::json;

    #[tokio::test]
    async fn trained_update_sets_every_field() -> Result<()> {
        // ARRANGE
        let catalog = MemoryCatalogRepository::new();
        let model = catalog
            .create_model(NewModel::builder().name("m").project_id("p").build())
            .await?;
        assert!(!model.is_trained);

        // ACT
        let trained = catalog
            .mark_model_trained(
                &model.id,
                TrainedModelUpdate {
                    model_path: "models/m/model.json".into(),
                    trained_at: Utc::now(),
                    training_duration_seconds: 1.5,
                    training_metrics: json!({"cg_shape": [10, 50, 3]}),
                },
            )
            .await?;

        // ASSERT
        assert!(trained.is_trained);
        assert_eq!(trained.model_path.as_deref(), Some("models/m/model.json"));
        assert_eq!(trained.training_duration_seconds, Some(1.5));
        assert_eq!(catalog.find_model(&model.id).await?, trained);
        Ok(())
    }

    #[tokio::test]
    async fn missing_molecule_is_not_found() {
        let catalog = MemoryCatalogRepository::new();
        let result = catalog.find_molecule("nope").await;
        assert!(matches!(result, Err(DbError::NotFound { entity: "Molecule", .. })));
    }
}
