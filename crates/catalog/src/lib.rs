//! File catalog abstraction and implementations for chunkvault.
//!
//! The catalog maps filenames to their committed revisions:
//! - Revision numbering per filename, assigned at insert
//! - Lookup by filename and revision number, or by file ID
//! - Rename and removal of individual revisions
//! - Filename enumeration with case-insensitive prefix filtering

pub mod error;
pub mod memory;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{CatalogError, CatalogResult};
pub use memory::MemoryCatalog;
pub use repos::RevisionRepo;
pub use store::{FileCatalog, SqliteCatalog};

use chunkvault_core::config::CatalogConfig;
use std::sync::Arc;

/// Create a file catalog for `bucket` from configuration.
pub async fn from_config(
    config: &CatalogConfig,
    bucket: &str,
) -> CatalogResult<Arc<dyn FileCatalog>> {
    config.validate().map_err(CatalogError::Config)?;

    match config {
        CatalogConfig::Sqlite {
            path,
            busy_timeout_secs,
        } => {
            let catalog = SqliteCatalog::new(
                path,
                bucket,
                std::time::Duration::from_secs(*busy_timeout_secs),
            )
            .await?;
            Ok(Arc::new(catalog) as Arc<dyn FileCatalog>)
        }
        CatalogConfig::Memory => Ok(Arc::new(MemoryCatalog::new(bucket)) as Arc<dyn FileCatalog>),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_config_sqlite() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("catalog.db");
        let config = CatalogConfig::Sqlite {
            path: db_path.clone(),
            busy_timeout_secs: 1,
        };

        let catalog = from_config(&config, "fs").await.unwrap();
        catalog.health_check().await.unwrap();
        assert_eq!(catalog.bucket(), "fs");
        assert_eq!(catalog.backend_name(), "sqlite");
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_from_config_memory() {
        let catalog = from_config(&CatalogConfig::Memory, "media").await.unwrap();
        assert_eq!(catalog.bucket(), "media");
        assert!(catalog.list_filenames(None).await.unwrap().is_empty());
    }
}
