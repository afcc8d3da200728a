//! Upload pipeline: chunk-aligned writes, commit and rollback.

use crate::chunks::ChunkStore;
use crate::error::{BucketError, BucketResult};
use bytes::BytesMut;
use chunkvault_catalog::{FileCatalog, RevisionRepo};
use chunkvault_core::{
    ChecksumAlgorithm, ChecksumHasher, Clock, FileId, FileRevision, NewRevision, UploadState,
};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Uploads that have started writing chunks but not yet committed or aborted.
pub(crate) type InFlight = Arc<DashMap<FileId, String>>;

/// Registers an upload as in flight until dropped.
struct InFlightGuard {
    registry: InFlight,
    id: FileId,
}

impl InFlightGuard {
    fn register(registry: InFlight, id: FileId, filename: &str) -> Self {
        registry.insert(id, filename.to_string());
        Self { registry, id }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}

/// Everything an upload needs from its bucket.
#[derive(Clone)]
pub(crate) struct UploadContext {
    pub chunks: ChunkStore,
    pub catalog: Arc<dyn FileCatalog>,
    pub clock: Arc<dyn Clock>,
    pub in_flight: InFlight,
}

/// Handle for one in-progress upload.
///
/// Bytes passed to [`write`](Self::write) are buffered and flushed to the
/// chunk store one full chunk at a time. Nothing is visible in the catalog
/// until [`commit`](Self::commit) succeeds. Any failure rolls back every
/// chunk written so far and poisons the handle.
pub struct Upload {
    id: FileId,
    filename: String,
    chunk_size: u64,
    metadata: Option<serde_json::Value>,
    buffer: BytesMut,
    hasher: Option<ChecksumHasher>,
    next_index: u64,
    length: u64,
    state: UploadState,
    ctx: UploadContext,
    _guard: InFlightGuard,
}

impl Upload {
    pub(crate) fn new(
        ctx: UploadContext,
        filename: &str,
        chunk_size: u64,
        checksum: ChecksumAlgorithm,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        let id = FileId::new();
        let guard = InFlightGuard::register(ctx.in_flight.clone(), id, filename);
        debug!(%id, filename, chunk_size, "upload started");
        Self {
            id,
            filename: filename.to_string(),
            chunk_size,
            metadata,
            buffer: BytesMut::with_capacity(chunk_size as usize),
            hasher: Some(checksum.hasher()),
            next_index: 0,
            length: 0,
            state: UploadState::Open,
            ctx,
            _guard: guard,
        }
    }

    /// File ID the revision will be committed under.
    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Bytes accepted so far.
    pub fn bytes_written(&self) -> u64 {
        self.length
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    /// Append bytes to the upload.
    ///
    /// Flushes one chunk store write per complete chunk. On a failed flush
    /// the upload is rolled back and the handle rejects further writes.
    pub async fn write(&mut self, data: &[u8]) -> BucketResult<()> {
        self.ensure_open()?;
        if data.is_empty() {
            return Ok(());
        }

        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(data);
        }
        self.length += data.len() as u64;
        self.buffer.extend_from_slice(data);

        while self.buffer.len() as u64 >= self.chunk_size {
            let chunk = self.buffer.split_to(self.chunk_size as usize).freeze();
            if let Err(e) = self.flush_chunk(chunk).await {
                return Err(self.fail(e).await);
            }
        }
        Ok(())
    }

    /// Flush the trailing partial chunk and record the revision in the catalog.
    #[instrument(skip(self), fields(id = %self.id, filename = %self.filename, length = self.length))]
    pub async fn commit(mut self) -> BucketResult<FileRevision> {
        self.ensure_open()?;

        if !self.buffer.is_empty() {
            let chunk = self.buffer.split().freeze();
            if let Err(e) = self.flush_chunk(chunk).await {
                return Err(self.fail(e).await);
            }
        }

        let checksum = match self.hasher.take() {
            Some(hasher) => hasher.finalize(),
            None => {
                return Err(BucketError::InvalidArgument(
                    "upload checksum already finalized".to_string(),
                ));
            }
        };

        let new = NewRevision {
            id: self.id,
            filename: self.filename.clone(),
            length: self.length,
            chunk_size: self.chunk_size,
            checksum,
            uploaded_at: self.ctx.clock.now(),
            metadata: self.metadata.take(),
        };

        match self.ctx.catalog.insert(new).await {
            Ok(revision) => {
                self.state = UploadState::Committed;
                info!(
                    id = %revision.id,
                    filename = %revision.filename,
                    revision = revision.revision,
                    length = revision.length,
                    chunks = self.next_index,
                    checksum = %revision.checksum,
                    "upload committed"
                );
                Ok(revision)
            }
            Err(e) => Err(self.fail(e.into()).await),
        }
    }

    /// Discard the upload and delete its chunks.
    pub async fn abort(mut self) -> BucketResult<()> {
        if self.state.is_terminal() {
            return Ok(());
        }
        self.state = UploadState::Aborted;
        let deleted = self.ctx.chunks.delete_chunks(self.id).await?;
        info!(id = %self.id, filename = %self.filename, deleted, "upload aborted");
        Ok(())
    }

    fn ensure_open(&self) -> BucketResult<()> {
        if self.state.is_active() {
            Ok(())
        } else {
            Err(BucketError::InvalidArgument(format!(
                "upload {} is {}",
                self.id,
                self.state.as_str()
            )))
        }
    }

    async fn flush_chunk(&mut self, chunk: bytes::Bytes) -> BucketResult<()> {
        let index = self.next_index;
        self.ctx.chunks.put_chunk(self.id, index, chunk).await?;
        self.next_index += 1;
        Ok(())
    }

    /// Roll back every chunk written so far and poison the handle.
    async fn fail(&mut self, err: BucketError) -> BucketError {
        self.state = UploadState::Failed;
        self.buffer.clear();
        warn!(id = %self.id, filename = %self.filename, error = %err, "upload failed, rolling back");

        match self.ctx.chunks.delete_chunks(self.id).await {
            Ok(deleted) => debug!(id = %self.id, deleted, "rollback complete"),
            Err(rollback) => warn!(
                id = %self.id,
                error = %rollback,
                "rollback incomplete, chunks left for the orphan sweep"
            ),
        }
        err
    }
}

impl Drop for Upload {
    fn drop(&mut self) {
        if self.state.is_active() {
            warn!(
                id = %self.id,
                filename = %self.filename,
                chunks = self.next_index,
                "upload dropped without commit or abort"
            );
        }
    }
}

impl std::fmt::Debug for Upload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upload")
            .field("id", &self.id)
            .field("filename", &self.filename)
            .field("chunk_size", &self.chunk_size)
            .field("length", &self.length)
            .field("state", &self.state)
            .finish()
    }
}
