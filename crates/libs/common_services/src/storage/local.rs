use crate::storage::{ArtifactStore, StorageError};
use async_trait::async_trait;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Artifacts as files under a root directory.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a key to a file under the root. Keys may not escape the root.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let invalid = |reason: &str| StorageError::InvalidPath {
            path: path.to_owned(),
            reason: reason.to_owned(),
        };
        if path.trim().is_empty() {
            return Err(invalid("empty path"));
        }

        let mut resolved = self.root.clone();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir => return Err(invalid("'..' is not allowed")),
                Component::RootDir | Component::Prefix(_) => {
                    return Err(invalid("absolute paths are not allowed"));
                }
            }
        }
        Ok(resolved)
    }
}

fn not_found_or(path: &str, error: io::Error) -> StorageError {
    if error.kind() == io::ErrorKind::NotFound {
        StorageError::NotFound {
            path: path.to_owned(),
        }
    } else {
        StorageError::Io(error)
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn save_bytes(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let file = self.resolve(path)?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).await?;
        }
        debug!("Writing {} bytes to {}", bytes.len(), file.display());
        fs::write(&file, bytes).await?;
        Ok(())
    }

    async fn load_bytes(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let file = self.resolve(path)?;
        fs::read(&file).await.map_err(|e| not_found_or(path, e))
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let file = self.resolve(path)?;
        match fs::remove_file(&file).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(StorageError::Io(e)),
            _ => Ok(()),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let file = self.resolve(path)?;
        Ok(fs::try_exists(&file).await?)
    }
}
