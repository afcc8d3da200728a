//! Bucket error types.

use chunkvault_catalog::CatalogError;
use chunkvault_storage::StorageError;
use thiserror::Error;

/// A failure of one of the substrates a bucket is built on.
#[derive(Debug, Error)]
pub enum TransientError {
    #[error("storage: {0}")]
    Storage(#[source] StorageError),

    #[error("catalog: {0}")]
    Catalog(#[source] CatalogError),

    /// Reading the caller's byte source failed.
    #[error("source stream: {0}")]
    Source(#[source] std::io::Error),
}

/// Errors surfaced by bucket operations.
#[derive(Debug, Error)]
pub enum BucketError {
    /// Filename, revision or file ID does not resolve.
    #[error("not found: {0}")]
    NotFound(String),

    /// The object store or catalog failed. Not retried.
    #[error("transient failure: {0}")]
    Transient(#[from] TransientError),

    /// A committed revision's chunks disagree with its recorded length or checksum.
    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl BucketError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity(_))
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<StorageError> for BucketError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => Self::NotFound(key),
            other => Self::Transient(TransientError::Storage(other)),
        }
    }
}

impl From<CatalogError> for BucketError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(what) => Self::NotFound(what),
            other => Self::Transient(TransientError::Catalog(other)),
        }
    }
}

impl From<std::io::Error> for BucketError {
    fn from(err: std::io::Error) -> Self {
        Self::Transient(TransientError::Source(err))
    }
}

impl From<chunkvault_core::Error> for BucketError {
    fn from(err: chunkvault_core::Error) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

impl From<BucketError> for std::io::Error {
    fn from(err: BucketError) -> Self {
        let kind = match &err {
            BucketError::NotFound(_) => std::io::ErrorKind::NotFound,
            BucketError::Integrity(_) => std::io::ErrorKind::InvalidData,
            BucketError::InvalidArgument(_) => std::io::ErrorKind::InvalidInput,
            BucketError::Transient(_) => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}

/// Result type for bucket operations.
pub type BucketResult<T> = std::result::Result<T, BucketError>;
