use crate::{GroCodec, PdbCodec, StructureCodec, StructureError};
use common_types::FileFormat;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Maps a file format to the codec that handles it.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<FileFormat, Arc<dyn StructureCodec>>,
}

impl CodecRegistry {
    /// A registry without any codecs.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// PDB and GRO.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(PdbCodec));
        registry.register(Arc::new(GroCodec));
        registry
    }

    /// Registers `codec` for its format, returning the codec it replaced.
    pub fn register(&mut self, codec: Arc<dyn StructureCodec>) -> Option<Arc<dyn StructureCodec>> {
        self.codecs.insert(codec.format(), codec)
    }

    pub fn for_format(&self, format: FileFormat) -> Result<Arc<dyn StructureCodec>, StructureError> {
        self.codecs.get(&format).cloned().ok_or_else(|| {
            StructureError::UnsupportedFormat(format!("no codec registered for {format}"))
        })
    }

    /// Case-insensitive, with or without the leading dot.
    pub fn for_extension(&self, extension: &str) -> Result<Arc<dyn StructureCodec>, StructureError> {
        let format = FileFormat::from_extension(extension)
            .ok_or_else(|| StructureError::UnsupportedFormat(extension.to_owned()))?;
        self.for_format(format)
    }

    pub fn for_path(&self, path: impl AsRef<Path>) -> Result<Arc<dyn StructureCodec>, StructureError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| StructureError::UnsupportedFormat(path.display().to_string()))?;
        self.for_extension(extension)
    }

    /// Formats with a registered codec, in declaration order.
    #[must_use]
    pub fn supported_formats(&self) -> Vec<FileFormat> {
        FileFormat::ALL
            .into_iter()
            .filter(|f| self.codecs.contains_key(f))
            .collect()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
