//! Filename and revision selector resolution.

use crate::error::{BucketError, BucketResult};
use chunkvault_catalog::{FileCatalog, RevisionRepo};
use chunkvault_core::{FileId, FileRevision, RevisionSelector, validate_filename};
use std::sync::Arc;

/// Resolves filenames to committed revisions through the catalog.
#[derive(Clone)]
pub struct RevisionResolver {
    catalog: Arc<dyn FileCatalog>,
}

impl RevisionResolver {
    pub fn new(catalog: Arc<dyn FileCatalog>) -> Self {
        Self { catalog }
    }

    /// Resolve `filename` at `selector`, failing with `NotFound` if absent.
    pub async fn resolve(
        &self,
        filename: &str,
        selector: RevisionSelector,
    ) -> BucketResult<FileRevision> {
        validate_filename(filename)?;
        let found = match selector {
            RevisionSelector::Latest => self.catalog.find_latest(filename).await?,
            RevisionSelector::Number(n) => self.catalog.find_revision(filename, n).await?,
        };
        found.ok_or_else(|| BucketError::NotFound(format!("{filename} ({selector})")))
    }

    /// Like [`resolve`](Self::resolve) but maps `NotFound` to `None`.
    pub async fn try_resolve(
        &self,
        filename: &str,
        selector: RevisionSelector,
    ) -> BucketResult<Option<FileRevision>> {
        match self.resolve(filename, selector).await {
            Ok(revision) => Ok(Some(revision)),
            Err(BucketError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn resolve_id(&self, id: FileId) -> BucketResult<FileRevision> {
        self.catalog
            .find_by_id(id)
            .await?
            .ok_or_else(|| BucketError::NotFound(format!("file id {id}")))
    }
}
