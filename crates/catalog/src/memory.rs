//! In-process file catalog.

use crate::error::{CatalogError, CatalogResult};
use crate::repos::RevisionRepo;
use crate::repos::revisions::matches_prefix;
use crate::store::FileCatalog;
use async_trait::async_trait;
use chunkvault_core::{FileId, FileRevision, NewRevision};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    by_id: HashMap<FileId, FileRevision>,
    /// filename -> revision number -> id
    by_name: BTreeMap<String, BTreeMap<u64, FileId>>,
}

impl Inner {
    fn next_revision(&self, filename: &str) -> u64 {
        self.by_name
            .get(filename)
            .and_then(|revisions| revisions.keys().next_back())
            .map_or(0, |n| n + 1)
    }

    fn unlink(&mut self, revision: &FileRevision) {
        if let Some(revisions) = self.by_name.get_mut(&revision.filename) {
            revisions.remove(&revision.revision);
            if revisions.is_empty() {
                self.by_name.remove(&revision.filename);
            }
        }
    }

    fn link(&mut self, revision: FileRevision) -> FileRevision {
        self.by_name
            .entry(revision.filename.clone())
            .or_default()
            .insert(revision.revision, revision.id);
        self.by_id.insert(revision.id, revision.clone());
        revision
    }
}

/// File catalog held in memory. Nothing survives process exit.
pub struct MemoryCatalog {
    bucket: String,
    inner: RwLock<Inner>,
}

impl MemoryCatalog {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            inner: RwLock::new(Inner::default()),
        }
    }
}

#[async_trait]
impl RevisionRepo for MemoryCatalog {
    async fn insert(&self, revision: NewRevision) -> CatalogResult<FileRevision> {
        let mut inner = self.inner.write().await;
        if inner.by_id.contains_key(&revision.id) {
            return Err(CatalogError::AlreadyExists(format!(
                "file_id {} already catalogued",
                revision.id
            )));
        }
        let next = inner.next_revision(&revision.filename);
        Ok(inner.link(revision.into_revision(next)))
    }

    async fn find_latest(&self, filename: &str) -> CatalogResult<Option<FileRevision>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_name
            .get(filename)
            .and_then(|revisions| revisions.values().next_back())
            .and_then(|id| inner.by_id.get(id))
            .cloned())
    }

    async fn find_revision(
        &self,
        filename: &str,
        revision: u64,
    ) -> CatalogResult<Option<FileRevision>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_name
            .get(filename)
            .and_then(|revisions| revisions.get(&revision))
            .and_then(|id| inner.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: FileId) -> CatalogResult<Option<FileRevision>> {
        Ok(self.inner.read().await.by_id.get(&id).cloned())
    }

    async fn remove(&self, id: FileId) -> CatalogResult<()> {
        let mut inner = self.inner.write().await;
        let revision = inner
            .by_id
            .remove(&id)
            .ok_or_else(|| CatalogError::NotFound(format!("file_id {id} not found")))?;
        inner.unlink(&revision);
        Ok(())
    }

    async fn rename(&self, id: FileId, new_filename: &str) -> CatalogResult<FileRevision> {
        let mut inner = self.inner.write().await;
        let current = inner
            .by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("file_id {id} not found")))?;
        if current.filename == new_filename {
            return Ok(current);
        }

        inner.unlink(&current);
        let revision = inner.next_revision(new_filename);
        Ok(inner.link(FileRevision {
            filename: new_filename.to_string(),
            revision,
            ..current
        }))
    }

    async fn list_filenames(&self, prefix: Option<&str>) -> CatalogResult<Vec<String>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_name
            .keys()
            .filter(|name| prefix.is_none_or(|p| matches_prefix(name, p)))
            .cloned()
            .collect())
    }

    async fn list_revisions(&self, filename: &str) -> CatalogResult<Vec<FileRevision>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_name
            .get(filename)
            .into_iter()
            .flat_map(|revisions| revisions.values())
            .filter_map(|id| inner.by_id.get(id).cloned())
            .collect())
    }

    async fn list_ids(&self) -> CatalogResult<Vec<FileId>> {
        Ok(self.inner.read().await.by_id.keys().copied().collect())
    }

    async fn clear(&self) -> CatalogResult<u64> {
        let mut inner = self.inner.write().await;
        let removed = inner.by_id.len() as u64;
        *inner = Inner::default();
        Ok(removed)
    }
}

#[async_trait]
impl FileCatalog for MemoryCatalog {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> CatalogResult<()> {
        Ok(())
    }
}
