//! Database models mapping to the catalog schema.

use crate::error::{CatalogError, CatalogResult};
use chunkvault_core::{Checksum, ChecksumAlgorithm, FileId, FileRevision};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// One catalogued revision, as stored.
#[derive(Debug, Clone, FromRow)]
pub struct RevisionRow {
    pub file_id: Uuid,
    pub bucket: String,
    pub filename: String,
    pub revision: i64,
    pub length: i64,
    pub chunk_size: i64,
    pub checksum_algorithm: String,
    pub checksum: String,
    pub uploaded_at: OffsetDateTime,
    /// JSON document, if the uploader supplied one.
    pub metadata: Option<String>,
}

fn to_i64(field: &str, value: u64) -> CatalogResult<i64> {
    i64::try_from(value)
        .map_err(|_| CatalogError::Internal(format!("{field} {value} exceeds i64 range")))
}

fn to_u64(field: &str, value: i64) -> CatalogResult<u64> {
    u64::try_from(value)
        .map_err(|_| CatalogError::Internal(format!("negative {field} in catalog: {value}")))
}

impl RevisionRow {
    /// Build a row from a domain revision.
    pub fn from_revision(bucket: &str, revision: &FileRevision) -> CatalogResult<Self> {
        let metadata = revision
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        Ok(Self {
            file_id: *revision.id.as_uuid(),
            bucket: bucket.to_string(),
            filename: revision.filename.clone(),
            revision: to_i64("revision", revision.revision)?,
            length: to_i64("length", revision.length)?,
            chunk_size: to_i64("chunk_size", revision.chunk_size)?,
            checksum_algorithm: revision.checksum.algorithm().as_str().to_string(),
            checksum: revision.checksum.as_hex().to_string(),
            uploaded_at: revision.uploaded_at,
            metadata,
        })
    }

    /// Convert back into a domain revision, validating stored values.
    pub fn into_revision(self) -> CatalogResult<FileRevision> {
        let algorithm = self
            .checksum_algorithm
            .parse::<ChecksumAlgorithm>()
            .map_err(|e| CatalogError::Internal(e.to_string()))?;
        let checksum = Checksum::from_hex(algorithm, &self.checksum)
            .map_err(|e| CatalogError::Internal(e.to_string()))?;
        let chunk_size = to_u64("chunk_size", self.chunk_size)?;
        if chunk_size == 0 {
            return Err(CatalogError::Internal(format!(
                "zero chunk size for file {}",
                self.file_id
            )));
        }
        let metadata = self
            .metadata
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(FileRevision {
            id: FileId::from_uuid(self.file_id),
            filename: self.filename,
            revision: to_u64("revision", self.revision)?,
            length: to_u64("length", self.length)?,
            chunk_size,
            checksum,
            uploaded_at: self.uploaded_at,
            metadata,
        })
    }
}
