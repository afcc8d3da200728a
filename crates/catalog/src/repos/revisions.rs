//! File revision repository.

use crate::error::CatalogResult;
use async_trait::async_trait;
use chunkvault_core::{FileId, FileRevision, NewRevision};

/// Repository for file revision records within one bucket.
///
/// Lookups return `None` for missing records; mutations of a missing record
/// fail with `CatalogError::NotFound`.
#[async_trait]
pub trait RevisionRepo: Send + Sync {
    /// Insert a fully uploaded revision.
    ///
    /// The revision number is `max(existing) + 1` for the filename, or 0 for a
    /// fresh filename, assigned atomically with the insert.
    async fn insert(&self, revision: NewRevision) -> CatalogResult<FileRevision>;

    /// Get the revision with the highest revision number for a filename.
    async fn find_latest(&self, filename: &str) -> CatalogResult<Option<FileRevision>>;

    /// Get an explicit revision number of a filename.
    async fn find_revision(
        &self,
        filename: &str,
        revision: u64,
    ) -> CatalogResult<Option<FileRevision>>;

    /// Get a revision by its file ID.
    async fn find_by_id(&self, id: FileId) -> CatalogResult<Option<FileRevision>>;

    /// Remove one revision record.
    async fn remove(&self, id: FileId) -> CatalogResult<()>;

    /// Move a revision under a new filename.
    ///
    /// The revision receives the next revision number of the target filename,
    /// becoming its current revision. Renaming to the same filename is a no-op.
    async fn rename(&self, id: FileId, new_filename: &str) -> CatalogResult<FileRevision>;

    /// Distinct filenames, sorted ascending.
    ///
    /// When `prefix` is given only filenames starting with it, compared
    /// case-insensitively, are returned.
    async fn list_filenames(&self, prefix: Option<&str>) -> CatalogResult<Vec<String>>;

    /// All revisions of a filename in ascending revision order.
    async fn list_revisions(&self, filename: &str) -> CatalogResult<Vec<FileRevision>>;

    /// Every file ID in the bucket.
    async fn list_ids(&self) -> CatalogResult<Vec<FileId>>;

    /// Remove every record in the bucket, returning how many were removed.
    async fn clear(&self) -> CatalogResult<u64>;
}

/// Case-insensitive prefix match used by `list_filenames`.
pub fn matches_prefix(filename: &str, prefix: &str) -> bool {
    prefix.is_empty() || filename.to_lowercase().starts_with(&prefix.to_lowercase())
}
