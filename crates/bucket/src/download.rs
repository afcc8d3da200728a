//! Download streams over a committed revision's chunks.

use crate::chunks::ChunkStore;
use crate::error::{BucketError, BucketResult};
use async_stream::try_stream;
use bytes::Bytes;
use chunkvault_core::{ChecksumHasher, FileRevision};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

type ByteStream = Pin<Box<dyn Stream<Item = BucketResult<Bytes>> + Send>>;

/// Lazy, forward-only stream of a revision's bytes.
///
/// Chunks are fetched one at a time in sequence order. Every chunk is checked
/// against the length the revision's layout expects; a full-file stream also
/// recomputes the checksum and fails with `Integrity` at the end on mismatch.
pub struct DownloadStream {
    revision: FileRevision,
    start: u64,
    end: u64,
    inner: ByteStream,
}

impl DownloadStream {
    /// Stream bytes `[start, end)` of `revision`. `end` must already be clamped.
    pub(crate) fn new(chunks: ChunkStore, revision: FileRevision, start: u64, end: u64) -> Self {
        let inner = Box::pin(chunk_stream(chunks, revision.clone(), start, end));
        Self {
            revision,
            start,
            end,
            inner,
        }
    }

    /// The revision being read.
    pub fn revision(&self) -> &FileRevision {
        &self.revision
    }

    /// Number of bytes the stream yields when it completes without error.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adapt to a tokio `AsyncRead`.
    ///
    /// Integrity failures surface as `InvalidData` I/O errors.
    pub fn into_async_read(self) -> impl AsyncRead + Send + Unpin {
        StreamReader::new(self)
    }
}

impl Stream for DownloadStream {
    type Item = BucketResult<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for DownloadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadStream")
            .field("id", &self.revision.id)
            .field("filename", &self.revision.filename)
            .field("start", &self.start)
            .field("end", &self.end)
            .finish()
    }
}

fn chunk_stream(
    chunks: ChunkStore,
    revision: FileRevision,
    start: u64,
    end: u64,
) -> impl Stream<Item = BucketResult<Bytes>> + Send {
    try_stream! {
        let layout = revision.layout();
        let full = start == 0 && end == revision.length;
        let mut hasher = full.then(|| revision.checksum.algorithm().hasher());

        for index in layout.chunks_for_range(start, end) {
            let chunk = fetch_chunk(&chunks, &revision, index).await?;
            if let Some(hasher) = hasher.as_mut() {
                hasher.update(&chunk);
            }

            // The layout guarantees the range exists once the length check passed.
            let range = layout.chunk_range(index).unwrap_or(0..0);
            let lo = start.max(range.start) - range.start;
            let hi = end.min(range.end) - range.start;
            yield chunk.slice(lo as usize..hi as usize);
        }

        if let Some(hasher) = hasher {
            verify_checksum(&revision, hasher)?;
        }
    }
}

fn verify_checksum(revision: &FileRevision, hasher: ChecksumHasher) -> BucketResult<()> {
    let actual = hasher.finalize();
    if actual != revision.checksum {
        return Err(BucketError::Integrity(format!(
            "{} ({}): checksum {} does not match recorded {}",
            revision.filename, revision.id, actual, revision.checksum
        )));
    }
    Ok(())
}

async fn fetch_chunk(
    chunks: &ChunkStore,
    revision: &FileRevision,
    index: u64,
) -> BucketResult<Bytes> {
    let expected = revision.layout().chunk_len(index).ok_or_else(|| {
        BucketError::Integrity(format!("{}: chunk {index} is past the end", revision.id))
    })?;

    let chunk = match chunks.get_chunk(revision.id, index).await {
        Ok(chunk) => chunk,
        Err(BucketError::NotFound(_)) => {
            return Err(BucketError::Integrity(format!(
                "{} ({}): chunk {index} is missing",
                revision.filename, revision.id
            )));
        }
        Err(e) => return Err(e),
    };

    if chunk.len() as u64 != expected {
        return Err(BucketError::Integrity(format!(
            "{} ({}): chunk {index} is {} bytes, expected {expected}",
            revision.filename,
            revision.id,
            chunk.len()
        )));
    }
    Ok(chunk)
}
