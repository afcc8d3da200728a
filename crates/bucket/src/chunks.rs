//! Chunk persistence over an object store.

use crate::error::BucketResult;
use bytes::Bytes;
use chunkvault_core::{ChunkRef, FileId};
use chunkvault_storage::{ObjectStore, StorageError};
use futures::TryStreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Stores the chunks of one bucket at `<bucket>/chunks/<file-id>/<index>`.
#[derive(Clone)]
pub struct ChunkStore {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ChunkStore {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Persist one chunk. Durable once this returns.
    #[instrument(skip(self, data), fields(bucket = %self.bucket, size = data.len()))]
    pub async fn put_chunk(&self, file_id: FileId, index: u64, data: Bytes) -> BucketResult<()> {
        let key = ChunkRef::new(file_id, index).to_object_key(&self.bucket);
        self.store.put(&key, data).await?;
        Ok(())
    }

    /// Fetch one chunk. Fails with `NotFound` if it was never written or is gone.
    pub async fn get_chunk(&self, file_id: FileId, index: u64) -> BucketResult<Bytes> {
        let key = ChunkRef::new(file_id, index).to_object_key(&self.bucket);
        Ok(self.store.get(&key).await?)
    }

    /// Delete every chunk of a file, returning how many were removed.
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    pub async fn delete_chunks(&self, file_id: FileId) -> BucketResult<u64> {
        let prefix = ChunkRef::file_prefix(&self.bucket, file_id);
        let keys = self.store.list(&prefix).await?;

        let mut deleted = 0;
        for key in keys {
            match self.store.delete(&key).await {
                Ok(()) => deleted += 1,
                // Already gone: a concurrent delete got there first.
                Err(StorageError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        debug!(%file_id, deleted, "deleted chunks");
        Ok(deleted)
    }

    /// Number of chunks currently stored for a file.
    pub async fn chunk_count(&self, file_id: FileId) -> BucketResult<u64> {
        let prefix = ChunkRef::file_prefix(&self.bucket, file_id);
        Ok(self.store.list(&prefix).await?.len() as u64)
    }

    /// Every file ID with at least one stored chunk, with its chunk count.
    ///
    /// Keys under the bucket's chunk prefix that do not parse as chunk keys
    /// are skipped.
    pub async fn chunk_census(&self) -> BucketResult<BTreeMap<FileId, u64>> {
        let prefix = ChunkRef::bucket_prefix(&self.bucket);
        let mut keys = self.store.list_stream(&prefix).await?;

        let mut census = BTreeMap::new();
        while let Some(key) = keys.try_next().await? {
            match ChunkRef::from_object_key(&self.bucket, &key) {
                Ok(chunk) => *census.entry(chunk.file_id).or_insert(0) += 1,
                Err(e) => debug!(key = %key, error = %e, "skipping non-chunk object"),
            }
        }
        Ok(census)
    }
}
