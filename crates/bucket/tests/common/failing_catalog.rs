use async_trait::async_trait;
use chunkvault_catalog::{CatalogError, CatalogResult, FileCatalog, RevisionRepo};
use chunkvault_core::{FileId, FileRevision, NewRevision};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Wraps a catalog and rejects `insert` calls while failing.
pub struct FailingCatalog {
    inner: Arc<dyn FileCatalog>,
    failing: AtomicBool,
}

#[allow(dead_code)]
impl FailingCatalog {
    pub fn new(inner: Arc<dyn FileCatalog>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failing: AtomicBool::new(false),
        })
    }

    pub fn fail_inserts(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl RevisionRepo for FailingCatalog {
    async fn insert(&self, revision: NewRevision) -> CatalogResult<FileRevision> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CatalogError::Internal(format!(
                "injected insert failure for {}",
                revision.filename
            )));
        }
        self.inner.insert(revision).await
    }

    async fn find_latest(&self, filename: &str) -> CatalogResult<Option<FileRevision>> {
        self.inner.find_latest(filename).await
    }

    async fn find_revision(
        &self,
        filename: &str,
        revision: u64,
    ) -> CatalogResult<Option<FileRevision>> {
        self.inner.find_revision(filename, revision).await
    }

    async fn find_by_id(&self, id: FileId) -> CatalogResult<Option<FileRevision>> {
        self.inner.find_by_id(id).await
    }

    async fn remove(&self, id: FileId) -> CatalogResult<()> {
        self.inner.remove(id).await
    }

    async fn rename(&self, id: FileId, new_filename: &str) -> CatalogResult<FileRevision> {
        self.inner.rename(id, new_filename).await
    }

    async fn list_filenames(&self, prefix: Option<&str>) -> CatalogResult<Vec<String>> {
        self.inner.list_filenames(prefix).await
    }

    async fn list_revisions(&self, filename: &str) -> CatalogResult<Vec<FileRevision>> {
        self.inner.list_revisions(filename).await
    }

    async fn list_ids(&self) -> CatalogResult<Vec<FileId>> {
        self.inner.list_ids().await
    }

    async fn clear(&self) -> CatalogResult<u64> {
        self.inner.clear().await
    }
}

#[async_trait]
impl FileCatalog for FailingCatalog {
    fn bucket(&self) -> &str {
        self.inner.bucket()
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }

    async fn health_check(&self) -> CatalogResult<()> {
        self.inner.health_check().await
    }
}
