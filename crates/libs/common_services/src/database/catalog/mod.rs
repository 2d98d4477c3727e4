mod memory;
mod postgres;

pub use memory::*;
pub use postgres::*;

use crate::database::DbError;
use async_trait::async_trait;
use common_types::{ModelRecord, MoleculeRecord, NewModel, NewMolecule, TrainedModelUpdate};
use serde_json::Value;

/// Access to the model and molecule entities the tasks read and update.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_model(&self, model_id: &str) -> Result<ModelRecord, DbError>;

    async fn create_model(&self, new_model: NewModel) -> Result<ModelRecord, DbError>;

    /// Records which molecules and options a model is being trained with.
    async fn assign_training_inputs(
        &self,
        model_id: &str,
        cg_molecule_id: &str,
        atomistic_molecule_id: &str,
        training_config: Value,
    ) -> Result<ModelRecord, DbError>;

    /// Flags the model as trained. Only call after the artifact is stored.
    async fn mark_model_trained(
        &self,
        model_id: &str,
        update: TrainedModelUpdate,
    ) -> Result<ModelRecord, DbError>;

    async fn find_molecule(&self, molecule_id: &str) -> Result<MoleculeRecord, DbError>;

    async fn create_molecule(&self, new_molecule: NewMolecule) -> Result<MoleculeRecord, DbError>;
}
