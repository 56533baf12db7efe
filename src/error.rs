use std::path::PathBuf;
use thiserror::Error;

/// Per-image failures. The pipeline skips the image and keeps going.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Image is {width}x{height}, below the minimum dimension of {min}")]
    BelowMinResolution { width: u32, height: u32, min: u32 },

    #[error("Hash computation failed: {message}")]
    Hashing { message: String },
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checkpoint serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid checkpoint: {message}")]
    Invalid { message: String },
}

#[derive(Debug, Error)]
pub enum FingerprintParseError {
    #[error("Invalid hex string length {0}")]
    OddLength(usize),

    #[error("Invalid hex digit in {0:?}")]
    InvalidDigit(String),
}

/// Errors that abort a run before any image is processed.
#[derive(Debug, Error)]
pub enum DedupError {
    #[error("Invalid path: {} does not exist", path.display())]
    MissingRoot { path: PathBuf },

    #[error("Invalid path: {} is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}
