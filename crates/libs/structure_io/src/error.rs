use common_types::FileFormat;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StructureError {
    #[error("I/O operation failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("failed to parse {format} data: {details} (at line ~{line})")]
    Parse {
        format: FileFormat,
        line: usize,
        details: String,
    },

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("inconsistent structure: {0}")]
    Inconsistent(String),
}

impl StructureError {
    pub fn parse(format: FileFormat, line: usize, details: impl Into<String>) -> Self {
        Self::Parse {
            format,
            line,
            details: details.into(),
        }
    }
}
