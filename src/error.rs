//! Error types for DAS file operations

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for fiberio operations
#[derive(Error, Debug)]
pub enum FiberError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Out of range: {0}")]
    OutOfRange(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Unsupported parameter: {0}")]
    UnsupportedParameter(String),

    #[error("Ambiguous format for {}: claimed by {}", path.display(), formats.join(", "))]
    AmbiguousFormat { path: PathBuf, formats: Vec<String> },

    #[error("No registered format recognizes {}", .0.display())]
    UnknownFormat(PathBuf),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Decompression error: {0}")]
    Decompression(String),

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl FiberError {
    /// True for errors raised when a file claims a format but breaks its layout
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            FiberError::InvalidFormat(_)
                | FiberError::MissingField(_)
                | FiberError::Decompression(_)
        )
    }
}

/// Specialized Result type for fiberio operations
pub type Result<T> = std::result::Result<T, FiberError>;

impl From<serde_json::Error> for FiberError {
    fn from(err: serde_json::Error) -> Self {
        FiberError::Serialization(err.to_string())
    }
}
