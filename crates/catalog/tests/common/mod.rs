use chunkvault_catalog::{FileCatalog, MemoryCatalog, SqliteCatalog};
use chunkvault_core::{ChecksumAlgorithm, FileId, NewRevision};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use time::OffsetDateTime;

/// Every catalog implementation, each scoped to bucket `fs`.
///
/// The `TempDir` must outlive the catalogs.
pub async fn catalogs() -> (TempDir, Vec<Arc<dyn FileCatalog>>) {
    let temp_dir = TempDir::new().unwrap();
    let sqlite = SqliteCatalog::new(temp_dir.path().join("catalog.db"), "fs", Duration::from_secs(5))
        .await
        .unwrap();
    let catalogs: Vec<Arc<dyn FileCatalog>> =
        vec![Arc::new(sqlite), Arc::new(MemoryCatalog::new("fs"))];
    (temp_dir, catalogs)
}

/// An uploaded-but-uncatalogued revision of `data`.
pub fn new_revision(filename: &str, data: &[u8]) -> NewRevision {
    NewRevision {
        id: FileId::new(),
        filename: filename.to_string(),
        length: data.len() as u64,
        chunk_size: 4,
        checksum: ChecksumAlgorithm::Md5.digest(data),
        uploaded_at: OffsetDateTime::now_utc(),
        metadata: None,
    }
}
