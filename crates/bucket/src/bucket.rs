//! The bucket: uploads, downloads, maintenance and the key/value facade.

use crate::chunks::ChunkStore;
use crate::download::DownloadStream;
use crate::error::{BucketError, BucketResult};
use crate::resolver::RevisionResolver;
use crate::sweep::{self, SweepStats};
use crate::upload::{InFlight, Upload, UploadContext};
use bytes::Bytes;
use chunkvault_catalog::{FileCatalog, RevisionRepo};
use chunkvault_core::config::BucketConfig;
use chunkvault_core::{
    Clock, FileId, FileRevision, RevisionSelector, SystemClock, UploadOptions, validate_chunk_size,
    validate_filename,
};
use chunkvault_storage::ObjectStore;
use futures::TryStreamExt;
use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{info, instrument, warn};

/// Largest read issued against a caller's byte source at once.
const READ_BUFFER_SIZE: u64 = 64 * 1024;

/// Result of [`Bucket::list_keys`].
///
/// The store is flat, so `dirs` is always empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct KeyListing {
    pub dirs: Vec<String>,
    pub keys: Vec<String>,
}

/// Result of [`Bucket::drop_bucket`].
#[derive(Clone, Debug, Default, Serialize)]
pub struct DropStats {
    pub revisions_removed: u64,
    pub chunks_deleted: u64,
    pub in_flight_skipped: u64,
}

struct BucketInner {
    config: BucketConfig,
    chunks: ChunkStore,
    catalog: Arc<dyn FileCatalog>,
    resolver: RevisionResolver,
    clock: Arc<dyn Clock>,
    in_flight: InFlight,
}

/// A named, chunked file store.
///
/// Cheap to clone; clones share the same substrates and in-flight upload set.
#[derive(Clone)]
pub struct Bucket {
    inner: Arc<BucketInner>,
}

impl Bucket {
    /// Create a bucket over an object store and a catalog scoped to it.
    pub fn new(
        config: BucketConfig,
        store: Arc<dyn ObjectStore>,
        catalog: Arc<dyn FileCatalog>,
    ) -> BucketResult<Self> {
        Self::with_clock(config, store, catalog, Arc::new(SystemClock))
    }

    /// Like [`new`](Self::new) with an explicit upload timestamp source.
    pub fn with_clock(
        config: BucketConfig,
        store: Arc<dyn ObjectStore>,
        catalog: Arc<dyn FileCatalog>,
        clock: Arc<dyn Clock>,
    ) -> BucketResult<Self> {
        config.validate().map_err(BucketError::InvalidArgument)?;
        if catalog.bucket() != config.name {
            return Err(BucketError::InvalidArgument(format!(
                "catalog is scoped to bucket {:?}, expected {:?}",
                catalog.bucket(),
                config.name
            )));
        }

        let chunks = ChunkStore::new(store, config.name.clone());
        let resolver = RevisionResolver::new(catalog.clone());
        Ok(Self {
            inner: Arc::new(BucketInner {
                config,
                chunks,
                catalog,
                resolver,
                clock,
                in_flight: InFlight::default(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &BucketConfig {
        &self.inner.config
    }

    pub fn chunks(&self) -> &ChunkStore {
        &self.inner.chunks
    }

    pub fn catalog(&self) -> &Arc<dyn FileCatalog> {
        &self.inner.catalog
    }

    /// IDs of uploads that have started but not committed or aborted.
    pub fn in_flight_uploads(&self) -> Vec<FileId> {
        self.inner.in_flight.iter().map(|entry| *entry.key()).collect()
    }

    // Upload pipeline

    /// Start an upload. Nothing is visible until the handle is committed.
    pub fn begin_upload(&self, filename: &str, options: UploadOptions) -> BucketResult<Upload> {
        validate_filename(filename)?;
        let chunk_size = validate_chunk_size(
            options
                .chunk_size
                .unwrap_or(self.inner.config.chunk_size_bytes),
        )?;

        let ctx = UploadContext {
            chunks: self.inner.chunks.clone(),
            catalog: self.inner.catalog.clone(),
            clock: self.inner.clock.clone(),
            in_flight: self.inner.in_flight.clone(),
        };
        Ok(Upload::new(
            ctx,
            filename,
            chunk_size,
            self.inner.config.checksum,
            options.metadata,
        ))
    }

    /// Upload everything `reader` yields as a new revision of `filename`.
    #[instrument(skip(self, reader, options), fields(bucket = %self.inner.config.name))]
    pub async fn upload_from_reader<R>(
        &self,
        filename: &str,
        mut reader: R,
        options: UploadOptions,
    ) -> BucketResult<FileRevision>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut upload = self.begin_upload(filename, options)?;
        let mut buf = vec![0u8; upload.chunk_size().min(READ_BUFFER_SIZE) as usize];

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    if let Err(abort) = upload.abort().await {
                        warn!(error = %abort, "failed to discard upload after read error");
                    }
                    return Err(e.into());
                }
            };
            upload.write(&buf[..n]).await?;
        }

        upload.commit().await
    }

    // Downloads

    /// Open a stream over the whole of a committed revision.
    ///
    /// The catalog is consulted by ID, so a revision that has since been
    /// deleted fails here with `NotFound`.
    pub async fn open_download(&self, revision: &FileRevision) -> BucketResult<DownloadStream> {
        let current = self.inner.resolver.resolve_id(revision.id).await?;
        let length = current.length;
        Ok(DownloadStream::new(
            self.inner.chunks.clone(),
            current,
            0,
            length,
        ))
    }

    /// Open a stream over bytes `[start, min(end, length))` of a revision.
    pub async fn open_download_range(
        &self,
        revision: &FileRevision,
        start: u64,
        end: u64,
    ) -> BucketResult<DownloadStream> {
        let current = self.inner.resolver.resolve_id(revision.id).await?;
        if start > current.length {
            return Err(chunkvault_core::Error::InvalidRange(format!(
                "start {start} is past the end of {} ({} bytes)",
                current.filename, current.length
            ))
            .into());
        }
        if end < start {
            return Err(
                chunkvault_core::Error::InvalidRange(format!("end {end} is before start {start}"))
                    .into(),
            );
        }
        let end = end.min(current.length);
        Ok(DownloadStream::new(
            self.inner.chunks.clone(),
            current,
            start,
            end,
        ))
    }

    /// Open a stream over `filename` at `selector`.
    pub async fn open_download_by_name(
        &self,
        filename: &str,
        selector: RevisionSelector,
    ) -> BucketResult<DownloadStream> {
        let revision = self.resolve(filename, selector).await?;
        self.open_download(&revision).await
    }

    pub async fn resolve(
        &self,
        filename: &str,
        selector: RevisionSelector,
    ) -> BucketResult<FileRevision> {
        self.inner.resolver.resolve(filename, selector).await
    }

    pub async fn find_by_id(&self, id: FileId) -> BucketResult<FileRevision> {
        self.inner.resolver.resolve_id(id).await
    }

    // Key/value facade

    /// Read the latest revision of `filename` into memory.
    pub async fn read(&self, filename: &str) -> BucketResult<Bytes> {
        let mut stream = self.open_read_stream(filename).await?;
        let mut out = Vec::with_capacity(stream.len() as usize);
        while let Some(part) = stream.try_next().await? {
            out.extend_from_slice(&part);
        }
        Ok(Bytes::from(out))
    }

    /// Store `data` as a new revision of `filename`, returning its length.
    pub async fn write(
        &self,
        filename: &str,
        data: &[u8],
        options: UploadOptions,
    ) -> BucketResult<u64> {
        let mut upload = self.begin_upload(filename, options)?;
        upload.write(data).await?;
        Ok(upload.commit().await?.length)
    }

    /// Store everything `reader` yields as a new revision, returning its length.
    pub async fn write_from_reader<R>(
        &self,
        filename: &str,
        reader: R,
        options: UploadOptions,
    ) -> BucketResult<u64>
    where
        R: AsyncRead + Unpin + Send,
    {
        Ok(self
            .upload_from_reader(filename, reader, options)
            .await?
            .length)
    }

    pub async fn open_read_stream(&self, filename: &str) -> BucketResult<DownloadStream> {
        self.open_download_by_name(filename, RevisionSelector::Latest)
            .await
    }

    /// Delete the latest revision of `filename`. Chunks go first, then the catalog row.
    #[instrument(skip(self), fields(bucket = %self.inner.config.name))]
    pub async fn delete(&self, filename: &str) -> BucketResult<()> {
        let revision = self.resolve(filename, RevisionSelector::Latest).await?;
        self.remove_revision(&revision).await
    }

    /// Move the latest revision of `old` to become the latest revision of `new`.
    #[instrument(skip(self), fields(bucket = %self.inner.config.name))]
    pub async fn rename(&self, old: &str, new: &str) -> BucketResult<FileRevision> {
        validate_filename(new)?;
        let revision = self.resolve(old, RevisionSelector::Latest).await?;
        let renamed = self.inner.catalog.rename(revision.id, new).await?;
        info!(
            id = %renamed.id,
            from = old,
            to = %renamed.filename,
            revision = renamed.revision,
            "renamed file"
        );
        Ok(renamed)
    }

    pub async fn exists(&self, filename: &str) -> BucketResult<bool> {
        Ok(self
            .inner
            .resolver
            .try_resolve(filename, RevisionSelector::Latest)
            .await?
            .is_some())
    }

    /// Every filename with at least one revision, sorted.
    pub async fn keys(&self) -> BucketResult<Vec<String>> {
        Ok(self.inner.catalog.list_filenames(None).await?)
    }

    /// Filenames starting with `prefix`, compared case-insensitively.
    ///
    /// The prefix is trimmed of surrounding whitespace; an empty prefix lists
    /// every filename.
    pub async fn list_keys(&self, prefix: &str) -> BucketResult<KeyListing> {
        let prefix = prefix.trim();
        let prefix = (!prefix.is_empty()).then_some(prefix);
        let keys = self.inner.catalog.list_filenames(prefix).await?;
        Ok(KeyListing {
            dirs: Vec::new(),
            keys,
        })
    }

    /// Upload time of the latest revision.
    pub async fn mtime(&self, filename: &str) -> BucketResult<OffsetDateTime> {
        Ok(self
            .resolve(filename, RevisionSelector::Latest)
            .await?
            .uploaded_at)
    }

    /// Hex checksum of the latest revision.
    pub async fn checksum(&self, filename: &str) -> BucketResult<String> {
        Ok(self
            .resolve(filename, RevisionSelector::Latest)
            .await?
            .checksum
            .as_hex()
            .to_string())
    }

    pub async fn size(&self, filename: &str) -> BucketResult<u64> {
        Ok(self
            .resolve(filename, RevisionSelector::Latest)
            .await?
            .length)
    }

    /// Always false: filenames containing `/` are plain keys.
    pub fn is_directory(&self, _filename: &str) -> bool {
        false
    }

    /// Caller-supplied metadata of the latest revision.
    pub async fn metadata(&self, filename: &str) -> BucketResult<Option<serde_json::Value>> {
        Ok(self
            .resolve(filename, RevisionSelector::Latest)
            .await?
            .metadata)
    }

    // Maintenance

    /// Delete one revision of `filename`.
    pub async fn delete_revision(
        &self,
        filename: &str,
        selector: RevisionSelector,
    ) -> BucketResult<FileRevision> {
        let revision = self.resolve(filename, selector).await?;
        self.remove_revision(&revision).await?;
        Ok(revision)
    }

    pub async fn delete_by_id(&self, id: FileId) -> BucketResult<FileRevision> {
        let revision = self.find_by_id(id).await?;
        self.remove_revision(&revision).await?;
        Ok(revision)
    }

    /// Delete every revision of `filename`, returning how many were removed.
    #[instrument(skip(self), fields(bucket = %self.inner.config.name))]
    pub async fn purge(&self, filename: &str) -> BucketResult<u64> {
        validate_filename(filename)?;
        let revisions = self.inner.catalog.list_revisions(filename).await?;
        if revisions.is_empty() {
            return Err(BucketError::NotFound(filename.to_string()));
        }
        for revision in &revisions {
            self.remove_revision(revision).await?;
        }
        Ok(revisions.len() as u64)
    }

    /// Every committed revision of `filename`, oldest first.
    pub async fn revisions(&self, filename: &str) -> BucketResult<Vec<FileRevision>> {
        validate_filename(filename)?;
        Ok(self.inner.catalog.list_revisions(filename).await?)
    }

    /// Delete every chunk and catalog entry of the bucket.
    ///
    /// Chunks of uploads still in flight are left alone.
    #[instrument(skip(self), fields(bucket = %self.inner.config.name))]
    pub async fn drop_bucket(&self) -> BucketResult<DropStats> {
        let mut stats = DropStats::default();
        let census = self.inner.chunks.chunk_census().await?;
        for file_id in census.keys() {
            if self.inner.in_flight.contains_key(file_id) {
                stats.in_flight_skipped += 1;
                continue;
            }
            stats.chunks_deleted += self.inner.chunks.delete_chunks(*file_id).await?;
        }
        stats.revisions_removed = self.inner.catalog.clear().await?;

        info!(
            revisions_removed = stats.revisions_removed,
            chunks_deleted = stats.chunks_deleted,
            in_flight_skipped = stats.in_flight_skipped,
            "dropped bucket"
        );
        Ok(stats)
    }

    /// Delete chunk sets no catalog entry references and report damaged revisions.
    pub async fn sweep_orphans(&self, dry_run: bool) -> BucketResult<SweepStats> {
        sweep::sweep_orphans(
            &self.inner.chunks,
            self.inner.catalog.as_ref(),
            &self.inner.in_flight,
            dry_run,
        )
        .await
    }

    /// Check both substrates.
    pub async fn health_check(&self) -> BucketResult<()> {
        self.inner.chunks.object_store().health_check().await?;
        self.inner.catalog.health_check().await?;
        Ok(())
    }

    async fn remove_revision(&self, revision: &FileRevision) -> BucketResult<()> {
        let chunks = self.inner.chunks.delete_chunks(revision.id).await?;
        self.inner.catalog.remove(revision.id).await?;
        info!(
            id = %revision.id,
            filename = %revision.filename,
            revision = revision.revision,
            chunks,
            "deleted revision"
        );
        Ok(())
    }
}

impl std::fmt::Debug for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket")
            .field("name", &self.inner.config.name)
            .field("chunk_size", &self.inner.config.chunk_size_bytes)
            .field("storage", &self.inner.chunks.object_store().backend_name())
            .field("catalog", &self.inner.catalog.backend_name())
            .finish()
    }
}
