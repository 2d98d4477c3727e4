use crate::{BackmapAdapter, CoordinateTransform, LinearBackmapper, ModelError};
use common_types::BackmapOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

pub const FORMAT_VERSION: u32 = 1;

/// Rebuilds a transform from the state it produced.
pub type TransformLoader = fn(Value) -> Result<Box<dyn CoordinateTransform>, ModelError>;

#[derive(Debug, Serialize, Deserialize)]
struct ModelEnvelope {
    format_version: u32,
    backend: Option<String>,
    is_fitted: bool,
    options: BackmapOptions,
    state: Option<Value>,
}

/// Turns adapters into self-describing JSON blobs and back.
///
/// Backends are looked up by their `kind` when loading, so every backend that
/// can be saved must also be registered here.
#[derive(Debug, Clone)]
pub struct ModelSerializer {
    loaders: HashMap<String, TransformLoader>,
}

impl Default for ModelSerializer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ModelSerializer {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            loaders: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        let mut serializer = Self::empty();
        serializer.register(LinearBackmapper::KIND, LinearBackmapper::from_state);
        serializer
    }

    pub fn register(&mut self, kind: impl Into<String>, loader: TransformLoader) {
        self.loaders.insert(kind.into(), loader);
    }

    pub fn serialize(&self, adapter: &BackmapAdapter) -> Result<Vec<u8>, ModelError> {
        let envelope = ModelEnvelope {
            format_version: FORMAT_VERSION,
            backend: adapter.model().map(|m| m.kind().to_owned()),
            is_fitted: adapter.is_fitted(),
            options: adapter.options(),
            state: adapter.model().map(|m| m.state()).transpose()?,
        };
        Ok(serde_json::to_vec(&envelope)?)
    }

    pub fn deserialize(&self, bytes: &[u8]) -> Result<BackmapAdapter, ModelError> {
        let envelope: ModelEnvelope = serde_json::from_slice(bytes)?;
        if envelope.format_version != FORMAT_VERSION {
            return Err(ModelError::UnsupportedVersion(envelope.format_version));
        }

        let model = match (envelope.backend, envelope.state) {
            (Some(kind), Some(state)) => {
                let loader = self
                    .loaders
                    .get(&kind)
                    .ok_or_else(|| ModelError::UnknownBackend(kind.clone()))?;
                debug!("Restoring {kind} model");
                Some(loader(state)?)
            }
            _ => None,
        };
        Ok(BackmapAdapter::restore(
            model,
            envelope.is_fitted,
            envelope.options,
        ))
    }

    pub fn save(&self, adapter: &BackmapAdapter, path: &Path) -> Result<(), ModelError> {
        let bytes = self.serialize(adapter)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)?;
        Ok(())
    }

    pub fn load(&self, path: &Path) -> Result<BackmapAdapter, ModelError> {
        let bytes = std::fs::read(path)?;
        self.deserialize(&bytes)
    }
}
