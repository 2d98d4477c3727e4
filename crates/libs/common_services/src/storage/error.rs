use ndarray_npy::{ReadNpyError, WriteNpyError};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Artifact not found: {path}")]
    NotFound { path: String },

    #[error("Invalid artifact path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Cannot encode array: {0}")]
    Encode(#[from] WriteNpyError),

    #[error("Cannot decode array: {0}")]
    Decode(#[from] ReadNpyError),

    #[error("Unexpected array in '{path}': {details}")]
    InvalidArray { path: String, details: String },
}

impl StorageError {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
