//! File identifiers, committed revisions and revision selection.

use crate::chunk::ChunkLayout;
use crate::hash::Checksum;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Unique identifier of one file revision.
///
/// Every upload gets a fresh id; chunks are keyed by it, so no chunk is ever
/// shared between revisions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(Uuid);

impl FileId {
    /// Generate a new random file ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidFileId(format!("{s}: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", self.0)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reject filenames the catalog cannot key on.
pub fn validate_filename(filename: &str) -> crate::Result<&str> {
    if filename.is_empty() {
        return Err(crate::Error::InvalidFilename(
            "filename must not be empty".to_string(),
        ));
    }
    if filename.contains('\0') {
        return Err(crate::Error::InvalidFilename(format!(
            "filename contains a NUL byte: {filename:?}"
        )));
    }
    Ok(filename)
}

/// Which revision of a filename to resolve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisionSelector {
    /// The revision with the highest revision number.
    #[default]
    Latest,
    /// An explicit, zero-based revision number.
    Number(u64),
}

impl RevisionSelector {
    /// Convert a GridFS-style signed revision number.
    ///
    /// `-1` selects the latest revision, non-negative values select that
    /// revision number. Any other negative value is rejected.
    pub fn from_signed(revision: i64) -> crate::Result<Self> {
        match revision {
            -1 => Ok(Self::Latest),
            n if n >= 0 => Ok(Self::Number(n as u64)),
            n => Err(crate::Error::InvalidRevision(format!(
                "revision selector must be -1 (latest) or non-negative, got {n}"
            ))),
        }
    }
}

impl fmt::Display for RevisionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "latest"),
            Self::Number(n) => write!(f, "#{n}"),
        }
    }
}

/// Metadata for a revision that has been fully written but not yet catalogued.
///
/// The catalog assigns the revision number when it inserts this record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewRevision {
    pub id: FileId,
    pub filename: String,
    pub length: u64,
    pub chunk_size: u64,
    pub checksum: Checksum,
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl NewRevision {
    /// Attach the catalog-assigned revision number.
    pub fn into_revision(self, revision: u64) -> FileRevision {
        FileRevision {
            id: self.id,
            filename: self.filename,
            revision,
            length: self.length,
            chunk_size: self.chunk_size,
            checksum: self.checksum,
            uploaded_at: self.uploaded_at,
            metadata: self.metadata,
        }
    }
}

/// One committed, immutable upload generation of a filename.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileRevision {
    /// Unique revision identifier (owns the chunks).
    pub id: FileId,
    /// Logical filename.
    pub filename: String,
    /// Revision number, increasing per filename from 0.
    pub revision: u64,
    /// Total length in bytes.
    pub length: u64,
    /// Chunk size the revision was written with.
    pub chunk_size: u64,
    /// Content checksum over the whole byte stream.
    pub checksum: Checksum,
    /// When the upload was committed.
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
    /// Caller-supplied metadata document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl FileRevision {
    /// Chunk layout implied by the recorded length and chunk size.
    pub fn layout(&self) -> ChunkLayout {
        ChunkLayout::new(self.length, self.chunk_size)
    }

    /// Number of chunks this revision owns.
    pub fn chunk_count(&self) -> u64 {
        self.layout().chunk_count()
    }
}
