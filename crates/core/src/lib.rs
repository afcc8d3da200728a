//! Core domain types and shared logic for chunkvault.
//!
//! This crate defines the canonical data model used across all other crates:
//! - File identifiers, committed revisions and revision selectors
//! - Chunk layout math and chunk object keys
//! - Content checksums (MD5 for GridFS parity, SHA-256)
//! - Upload options and lifecycle states
//! - Timestamp sources
//! - Configuration shared by the engine and the CLI

pub mod chunk;
pub mod clock;
pub mod config;
pub mod error;
pub mod file;
pub mod hash;
pub mod upload;

pub use chunk::{ChunkLayout, ChunkRef};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use file::{FileId, FileRevision, NewRevision, RevisionSelector, validate_filename};
pub use hash::{Checksum, ChecksumAlgorithm, ChecksumHasher};
pub use upload::{UploadOptions, UploadState};

/// Default chunk size: 255 KiB, the GridFS default.
pub const DEFAULT_CHUNK_SIZE: u64 = 255 * 1024;

/// Maximum chunk size: 16 MiB.
pub const MAX_CHUNK_SIZE: u64 = 16 * 1024 * 1024;

/// Minimum chunk size: 1 byte.
pub const MIN_CHUNK_SIZE: u64 = 1;

/// Default bucket name, matching GridFS.
pub const DEFAULT_BUCKET_NAME: &str = "fs";

/// Validate a chunk size against [`MIN_CHUNK_SIZE`] and [`MAX_CHUNK_SIZE`].
pub fn validate_chunk_size(size: u64) -> Result<u64> {
    if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&size) {
        return Err(Error::InvalidChunkSize {
            size,
            min: MIN_CHUNK_SIZE,
            max: MAX_CHUNK_SIZE,
        });
    }
    Ok(size)
}
