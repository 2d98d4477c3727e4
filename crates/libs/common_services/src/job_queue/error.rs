use crate::database::DbError;
use crate::molecules::MoleculeError;
use crate::storage::StorageError;
use common_types::TransitionError;
use structure_io::StructureError;
use thiserror::Error;

/// Errors surfaced to the request layer when submitting or inspecting work.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    InvalidStateTransition(TransitionError),

    #[error("Database error: {0}")]
    Db(DbError),

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Structure error: {0}")]
    Structure(StructureError),

    #[error("JSON serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl From<DbError> for DispatchError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => Self::NotFound { entity, id },
            DbError::InvalidStateTransition(e) => Self::InvalidStateTransition(e),
            other => Self::Db(other),
        }
    }
}

impl From<StorageError> for DispatchError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { path } => Self::NotFound {
                entity: "Artifact",
                id: path,
            },
            other => Self::Storage(other),
        }
    }
}

impl From<MoleculeError> for DispatchError {
    fn from(err: MoleculeError) -> Self {
        match err {
            MoleculeError::Storage(e) => e.into(),
            MoleculeError::Db(e) => e.into(),
            MoleculeError::Structure(e) => Self::Structure(e),
        }
    }
}

impl DispatchError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Whether this maps to a 4xx-style response rather than a server error.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::BadRequest(_) | Self::InvalidStateTransition(_)
        )
    }
}
