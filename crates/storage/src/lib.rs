//! Object storage abstraction and backends for chunkvault.
//!
//! This crate provides:
//! - The `ObjectStore` trait chunk objects are persisted through
//! - Atomic, durable writes on the local filesystem
//! - An in-memory backend for tests and ephemeral buckets

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::{filesystem::FilesystemBackend, memory::MemoryBackend};
pub use error::{StorageError, StorageResult};
pub use traits::{KeyStream, ObjectMeta, ObjectStore};

use chunkvault_core::config::StorageConfig;
use std::sync::Arc;

/// Create an object store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::Filesystem { path } => {
            let backend = FilesystemBackend::new(path).await?;
            tracing::debug!(root = %path.display(), "opened filesystem object store");
            Ok(Arc::new(backend))
        }
        StorageConfig::Memory => Ok(Arc::new(MemoryBackend::new())),
    }
}
