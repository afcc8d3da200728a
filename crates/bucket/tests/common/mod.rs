pub mod failing_catalog;
pub mod fixtures;
pub mod flaky;

#[allow(unused_imports)]
pub use failing_catalog::FailingCatalog;
#[allow(unused_imports)]
pub use fixtures::seeded_bytes;
#[allow(unused_imports)]
pub use flaky::FlakyStore;

use chunkvault_bucket::Bucket;
use chunkvault_catalog::{FileCatalog, MemoryCatalog, SqliteCatalog};
use chunkvault_core::config::BucketConfig;
use chunkvault_core::{ChecksumAlgorithm, ManualClock};
use chunkvault_storage::{FilesystemBackend, MemoryBackend, ObjectStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use time::OffsetDateTime;
use time::macros::datetime;

/// Fixed start time for buckets built with a manual clock.
#[allow(dead_code)]
pub const EPOCH: OffsetDateTime = datetime!(2024-01-01 00:00 UTC);

pub fn bucket_config(chunk_size: u64) -> BucketConfig {
    BucketConfig {
        name: "fs".to_string(),
        chunk_size_bytes: chunk_size,
        checksum: ChecksumAlgorithm::Md5,
    }
}

/// A bucket entirely in memory, with direct access to its object store.
#[allow(dead_code)]
pub struct TestBucket {
    pub bucket: Bucket,
    pub store: Arc<MemoryBackend>,
    pub catalog: Arc<MemoryCatalog>,
    pub clock: Arc<ManualClock>,
}

#[allow(dead_code)]
impl TestBucket {
    pub fn new(chunk_size: u64) -> Self {
        let store = Arc::new(MemoryBackend::new());
        let catalog = Arc::new(MemoryCatalog::new("fs"));
        let clock = Arc::new(ManualClock::new(EPOCH));
        let bucket = Bucket::with_clock(
            bucket_config(chunk_size),
            store.clone(),
            catalog.clone(),
            clock.clone(),
        )
        .unwrap();
        Self {
            bucket,
            store,
            catalog,
            clock,
        }
    }

    /// Number of chunk objects in the store, across all files.
    pub async fn stored_chunks(&self) -> usize {
        self.store.list("fs/chunks/").await.unwrap().len()
    }
}

/// A bucket whose object store fails on demand.
#[allow(dead_code)]
pub fn flaky_bucket(chunk_size: u64) -> (Bucket, Arc<FlakyStore>, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let flaky = FlakyStore::new(backend.clone());
    let bucket = Bucket::new(
        bucket_config(chunk_size),
        flaky.clone(),
        Arc::new(MemoryCatalog::new("fs")),
    )
    .unwrap();
    (bucket, flaky, backend)
}

/// A bucket whose catalog rejects inserts on demand.
#[allow(dead_code)]
pub fn failing_catalog_bucket(chunk_size: u64) -> (Bucket, Arc<FailingCatalog>, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let catalog = FailingCatalog::new(Arc::new(MemoryCatalog::new("fs")));
    let bucket = Bucket::new(bucket_config(chunk_size), backend.clone(), catalog.clone()).unwrap();
    (bucket, catalog, backend)
}

/// A bucket on the filesystem backend and the SQLite catalog.
///
/// The `TempDir` must outlive the bucket.
#[allow(dead_code)]
pub async fn disk_bucket(chunk_size: u64) -> (TempDir, Bucket) {
    let temp_dir = TempDir::new().unwrap();
    let store: Arc<dyn ObjectStore> =
        Arc::new(FilesystemBackend::new(temp_dir.path().join("chunks")).await.unwrap());
    let catalog: Arc<dyn FileCatalog> = Arc::new(
        SqliteCatalog::new(temp_dir.path().join("catalog.db"), "fs", Duration::from_secs(5))
            .await
            .unwrap(),
    );
    let bucket = Bucket::new(bucket_config(chunk_size), store, catalog).unwrap();
    (temp_dir, bucket)
}
