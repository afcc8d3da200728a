//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    #[error("invalid chunk size: {size} (must be between {min} and {max})")]
    InvalidChunkSize { size: u64, min: u64, max: u64 },

    #[error("invalid revision: {0}")]
    InvalidRevision(String),

    #[error("invalid file id: {0}")]
    InvalidFileId(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("invalid checksum: {0}")]
    InvalidChecksum(String),

    #[error("unknown checksum algorithm: {0}")]
    UnknownChecksumAlgorithm(String),

    #[error("invalid chunk key: {0}")]
    InvalidChunkKey(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
