mod arrays;
mod error;
mod local;
pub mod paths;
mod s3;

pub use arrays::*;
pub use error::*;
pub use local::*;
pub use s3::*;

use app_state::{StorageBackend, StorageSettings};
use async_trait::async_trait;
use ndarray::{Array3, ArrayD, ArrayViewD, Ix3};
use std::sync::Arc;
use tracing::info;

/// Byte and numeric-array object storage.
///
/// Paths are `/`-separated keys such as `molecules/{project}/{id}/coordinates.npy`.
/// Loading a missing path fails with [`StorageError::NotFound`] on every backend.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn save_bytes(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError>;

    async fn load_bytes(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Removes the artifact. Deleting a missing path is not an error.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    async fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Stores `array` in `.npy` format and returns the key it was written to.
    async fn save_array(
        &self,
        path: &str,
        array: ArrayViewD<'_, f64>,
    ) -> Result<String, StorageError> {
        let path = paths::array_path(path);
        let bytes = encode_npy(array)?;
        self.save_bytes(&path, bytes).await?;
        Ok(path)
    }

    async fn load_array(&self, path: &str) -> Result<ArrayD<f64>, StorageError> {
        let path = paths::array_path(path);
        let bytes = self.load_bytes(&path).await?;
        decode_npy(&bytes)
    }

    /// Loads a `(frames, atoms, 3)` coordinate array.
    async fn load_coordinates(&self, path: &str) -> Result<Array3<f64>, StorageError> {
        let array = self.load_array(path).await?;
        let shape = array.shape().to_vec();
        let coordinates = array
            .into_dimensionality::<Ix3>()
            .map_err(|_| StorageError::InvalidArray {
                path: path.to_owned(),
                details: format!("expected (frames, atoms, 3), got shape {shape:?}"),
            })?;
        if coordinates.shape()[2] != 3 {
            return Err(StorageError::InvalidArray {
                path: path.to_owned(),
                details: format!("expected 3 spatial components, got shape {shape:?}"),
            });
        }
        Ok(coordinates)
    }
}

/// Builds the store selected by `storage.backend`. Called once at process start.
pub fn create_artifact_store(
    settings: &StorageSettings,
) -> Result<Arc<dyn ArtifactStore>, StorageError> {
    let store: Arc<dyn ArtifactStore> = match settings.backend {
        StorageBackend::Local => Arc::new(LocalArtifactStore::new(&settings.local_root)),
        StorageBackend::S3 => Arc::new(S3ArtifactStore::new(&settings.s3)?),
    };
    info!("Using {} artifact storage.", store.backend_name());
    Ok(store)
}
