//! Chunked file storage engine for chunkvault.
//!
//! A [`Bucket`] stores arbitrarily large files as fixed-size chunks in an
//! [`ObjectStore`](chunkvault_storage::ObjectStore) and records each upload
//! as a numbered revision in a [`FileCatalog`]. It provides:
//! - Streaming uploads with rollback on failure
//! - Streaming, integrity-checked downloads and range reads
//! - Revision resolution by filename
//! - A flat key/value facade (read, write, delete, rename, list)
//! - Maintenance: per-revision deletes, purge, drop and the orphan sweep

pub mod bucket;
pub mod chunks;
pub mod download;
pub mod error;
pub mod resolver;
pub mod sweep;
pub mod upload;

pub use bucket::{Bucket, DropStats, KeyListing};
pub use chunks::ChunkStore;
pub use download::DownloadStream;
pub use error::{BucketError, BucketResult, TransientError};
pub use resolver::RevisionResolver;
pub use sweep::SweepStats;
pub use upload::Upload;

use chunkvault_catalog::FileCatalog;
use chunkvault_core::config::AppConfig;

/// Open a bucket with the object store and catalog named in configuration.
pub async fn from_config(config: &AppConfig) -> BucketResult<Bucket> {
    config.validate().map_err(BucketError::InvalidArgument)?;

    let store = chunkvault_storage::from_config(&config.storage).await?;
    let catalog = chunkvault_catalog::from_config(&config.catalog, &config.bucket.name).await?;
    tracing::debug!(
        bucket = %config.bucket.name,
        storage = store.backend_name(),
        catalog = catalog.backend_name(),
        "opened bucket"
    );
    Bucket::new(config.bucket.clone(), store, catalog)
}
