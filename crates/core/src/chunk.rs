//! Chunk layout math and chunk object keys.

use crate::file::FileId;
use std::fmt;
use std::ops::Range;

/// Width of the zero-padded sequence index in chunk object keys.
///
/// Padding keeps lexicographic key order equal to sequence order.
const INDEX_WIDTH: usize = 10;

/// Address of one chunk: owning file plus zero-based sequence index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkRef {
    pub file_id: FileId,
    pub index: u64,
}

impl ChunkRef {
    pub fn new(file_id: FileId, index: u64) -> Self {
        Self { file_id, index }
    }

    /// Prefix under which every chunk of a bucket lives.
    pub fn bucket_prefix(bucket: &str) -> String {
        format!("{bucket}/chunks/")
    }

    /// Prefix under which every chunk of one file lives.
    pub fn file_prefix(bucket: &str, file_id: FileId) -> String {
        format!("{bucket}/chunks/{file_id}/")
    }

    /// Get the object store key for this chunk.
    pub fn to_object_key(&self, bucket: &str) -> String {
        format!(
            "{}{:0width$}",
            Self::file_prefix(bucket, self.file_id),
            self.index,
            width = INDEX_WIDTH
        )
    }

    /// Parse an object key produced by [`ChunkRef::to_object_key`].
    pub fn from_object_key(bucket: &str, key: &str) -> crate::Result<Self> {
        let prefix = Self::bucket_prefix(bucket);
        let rest = key
            .strip_prefix(&prefix)
            .ok_or_else(|| crate::Error::InvalidChunkKey(format!("outside {prefix}: {key}")))?;
        let (file_id, index) = rest
            .split_once('/')
            .ok_or_else(|| crate::Error::InvalidChunkKey(format!("missing index: {key}")))?;
        let file_id = FileId::parse(file_id)?;
        if index.len() != INDEX_WIDTH || !index.bytes().all(|b| b.is_ascii_digit()) {
            return Err(crate::Error::InvalidChunkKey(format!(
                "malformed index: {key}"
            )));
        }
        let index = index
            .parse::<u64>()
            .map_err(|e| crate::Error::InvalidChunkKey(format!("{key}: {e}")))?;
        Ok(Self { file_id, index })
    }
}

impl fmt::Debug for ChunkRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkRef({}#{})", self.file_id, self.index)
    }
}

/// How a file of `length` bytes splits into chunks of `chunk_size` bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkLayout {
    length: u64,
    chunk_size: u64,
}

impl ChunkLayout {
    /// `chunk_size` must be non-zero; callers validate it first.
    pub fn new(length: u64, chunk_size: u64) -> Self {
        debug_assert!(chunk_size > 0, "chunk size must be non-zero");
        Self { length, chunk_size }
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Calculate the number of chunks: `ceil(length / chunk_size)`.
    pub fn chunk_count(&self) -> u64 {
        self.length.div_ceil(self.chunk_size)
    }

    /// Expected size of chunk `index`, or `None` past the last chunk.
    pub fn chunk_len(&self, index: u64) -> Option<u64> {
        if index >= self.chunk_count() {
            return None;
        }
        let start = index * self.chunk_size;
        Some((self.length - start).min(self.chunk_size))
    }

    /// Byte range of the file covered by chunk `index`.
    pub fn chunk_range(&self, index: u64) -> Option<Range<u64>> {
        let len = self.chunk_len(index)?;
        let start = index * self.chunk_size;
        Some(start..start + len)
    }

    /// Chunk indices overlapping the byte range `[start, end)`.
    ///
    /// `end` is clamped to the file length.
    pub fn chunks_for_range(&self, start: u64, end: u64) -> Range<u64> {
        let end = end.min(self.length);
        if start >= end {
            return 0..0;
        }
        let first = start / self.chunk_size;
        let last = (end - 1) / self.chunk_size;
        first..last + 1
    }
}
