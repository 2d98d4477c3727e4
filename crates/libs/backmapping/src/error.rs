use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model not fitted")]
    NotTrained,

    #[error("No model provided")]
    NoModel,

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Normal equations are singular, training data is degenerate")]
    Singular,

    #[error("Model backend failed: {0}")]
    Backend(String),

    #[error("Unknown model backend '{0}'")]
    UnknownBackend(String),

    #[error("Unsupported model format version {0}")]
    UnsupportedVersion(u32),

    #[error("Model serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O operation failed: {0}")]
    Io(#[from] std::io::Error),
}
