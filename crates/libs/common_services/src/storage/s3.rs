use crate::storage::{ArtifactStore, StorageError};
use app_state::S3Settings;
use async_trait::async_trait;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use std::sync::Arc;
use tracing::debug;

/// Artifacts as objects in one bucket. Credentials come from the usual `AWS_*` variables.
#[derive(Debug, Clone)]
pub struct S3ArtifactStore {
    store: Arc<dyn ObjectStore>,
}

impl S3ArtifactStore {
    pub fn new(settings: &S3Settings) -> Result<Self, StorageError> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&settings.bucket)
            .with_region(&settings.region)
            .with_allow_http(settings.allow_http);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        Ok(Self::from_object_store(Arc::new(builder.build()?)))
    }

    /// Wraps any object store, e.g. `object_store::memory::InMemory` in tests.
    #[must_use]
    pub fn from_object_store(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    fn key(path: &str) -> Result<ObjectPath, StorageError> {
        ObjectPath::parse(path).map_err(|e| StorageError::InvalidPath {
            path: path.to_owned(),
            reason: e.to_string(),
        })
    }
}

fn not_found_or(path: &str, error: object_store::Error) -> StorageError {
    match error {
        object_store::Error::NotFound { .. } => StorageError::NotFound {
            path: path.to_owned(),
        },
        other => StorageError::ObjectStore(other),
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    fn backend_name(&self) -> &'static str {
        "s3"
    }

    async fn save_bytes(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let key = Self::key(path)?;
        debug!("Uploading {} bytes to {key}", bytes.len());
        self.store.put(&key, PutPayload::from(bytes)).await?;
        Ok(())
    }

    async fn load_bytes(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let key = Self::key(path)?;
        let object = self
            .store
            .get(&key)
            .await
            .map_err(|e| not_found_or(path, e))?;
        let bytes = object.bytes().await.map_err(|e| not_found_or(path, e))?;
        Ok(bytes.to_vec())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let key = Self::key(path)?;
        match self.store.delete(&key).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let key = Self::key(path)?;
        match self.store.head(&key).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::Result;
    use ndarray::Array3;
    use object_store::memory::InMemory;

    fn memory_store() -> S3ArtifactStore {
        S3ArtifactStore::from_object_store(Arc::new(InMemory::new()))
    }

    #[tokio::test]
    async fn arrays_round_trip_through_object_store() -> Result<()> {
        let store = memory_store();
        let coordinates = Array3::from_shape_fn((2, 3, 3), |(f, a, c)| (f * 9 + a * 3 + c) as f64);

        let key = store
            .save_array("molecules/p/m/coordinates", coordinates.view().into_dyn())
            .await?;

        assert_eq!(key, "molecules/p/m/coordinates.npy");
        assert!(store.exists(&key).await?);
        assert_eq!(store.load_coordinates(&key).await?, coordinates);
        Ok(())
    }

    #[tokio::test]
    async fn missing_object_is_not_found() -> Result<()> {
        let store = memory_store();

        let result = store.load_bytes("models/x/model.json").await;

        assert!(matches!(result, Err(StorageError::NotFound { .. })));
        assert!(!store.exists("models/x/model.json").await?);
        store.delete("models/x/model.json").await?;
        Ok(())
    }
}
