//! Configuration types shared across crates.

use crate::hash::ChecksumAlgorithm;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Bucket configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Bucket name; scopes chunk keys and catalog rows.
    #[serde(default = "default_bucket_name")]
    pub name: String,
    /// Default chunk size in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: u64,
    /// Checksum algorithm for new uploads.
    #[serde(default)]
    pub checksum: ChecksumAlgorithm,
}

fn default_bucket_name() -> String {
    crate::DEFAULT_BUCKET_NAME.to_string()
}

fn default_chunk_size() -> u64 {
    crate::DEFAULT_CHUNK_SIZE
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            name: default_bucket_name(),
            chunk_size_bytes: default_chunk_size(),
            checksum: ChecksumAlgorithm::default(),
        }
    }
}

impl BucketConfig {
    /// Validate bucket configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("bucket name must not be empty".to_string());
        }
        if name != self.name {
            return Err(format!(
                "bucket name must not have surrounding whitespace: {:?}",
                self.name
            ));
        }
        if self.name.contains('/') || self.name.contains('\\') || self.name.contains('\0') {
            return Err(format!(
                "bucket name must not contain path separators: {}",
                self.name
            ));
        }
        if self.name == "." || self.name == ".." {
            return Err(format!("bucket name is reserved: {}", self.name));
        }
        crate::validate_chunk_size(self.chunk_size_bytes).map_err(|e| e.to_string())?;
        Ok(())
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for chunk objects.
        path: PathBuf,
    },
    /// In-process storage. Contents are lost on exit.
    Memory,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/chunks"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Filesystem { path } if path.as_os_str().is_empty() => {
                Err("filesystem storage requires a non-empty 'path'".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// File catalog configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CatalogConfig {
    /// SQLite database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// How long a statement waits on a locked database before failing.
        #[serde(default = "default_busy_timeout_secs")]
        busy_timeout_secs: u64,
    },
    /// In-process catalog. Contents are lost on exit.
    Memory,
}

fn default_busy_timeout_secs() -> u64 {
    5
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/catalog.db"),
            busy_timeout_secs: default_busy_timeout_secs(),
        }
    }
}

impl CatalogConfig {
    /// Validate catalog configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            CatalogConfig::Sqlite { path, .. } if path.as_os_str().is_empty() => {
                Err("sqlite catalog requires a non-empty 'path'".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Busy timeout for SQLite, if configured.
    pub fn busy_timeout(&self) -> Option<Duration> {
        match self {
            CatalogConfig::Sqlite {
                busy_timeout_secs, ..
            } => Some(Duration::from_secs(*busy_timeout_secs)),
            CatalogConfig::Memory => None,
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bucket: BucketConfig,
    /// Chunk object storage.
    #[serde(default)]
    pub storage: StorageConfig,
    /// File catalog.
    #[serde(default)]
    pub catalog: CatalogConfig,
}

impl AppConfig {
    /// Create a configuration backed entirely by memory.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            bucket: BucketConfig::default(),
            storage: StorageConfig::Memory,
            catalog: CatalogConfig::Memory,
        }
    }

    /// Validate every section, prefixing errors with the section name.
    pub fn validate(&self) -> Result<(), String> {
        self.bucket.validate().map_err(|e| format!("bucket: {e}"))?;
        self.storage
            .validate()
            .map_err(|e| format!("storage: {e}"))?;
        self.catalog
            .validate()
            .map_err(|e| format!("catalog: {e}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_gridfs() {
        let config = AppConfig::default();
        assert_eq!(config.bucket.name, "fs");
        assert_eq!(config.bucket.chunk_size_bytes, 261_120);
        assert_eq!(config.bucket.checksum, ChecksumAlgorithm::Md5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        match config.storage {
            StorageConfig::Filesystem { path } => assert_eq!(path, PathBuf::from("./data/chunks")),
            other => panic!("expected filesystem storage, got {other:?}"),
        }
        match config.catalog {
            CatalogConfig::Sqlite {
                path,
                busy_timeout_secs,
            } => {
                assert_eq!(path, PathBuf::from("./data/catalog.db"));
                assert_eq!(busy_timeout_secs, 5);
            }
            other => panic!("expected sqlite catalog, got {other:?}"),
        }
    }

    #[test]
    fn test_tagged_backends() {
        let json = r#"{
            "bucket": {"name": "media", "chunk_size_bytes": 4, "checksum": "sha256"},
            "storage": {"type": "memory"},
            "catalog": {"type": "sqlite", "path": "/tmp/c.db"}
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.bucket.name, "media");
        assert_eq!(config.bucket.checksum, ChecksumAlgorithm::Sha256);
        assert!(matches!(config.storage, StorageConfig::Memory));
        assert_eq!(
            config.catalog.busy_timeout(),
            Some(Duration::from_secs(5)),
            "busy_timeout_secs should default when omitted"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bucket_validation() {
        let mut bucket = BucketConfig::default();
        bucket.chunk_size_bytes = 0;
        assert!(bucket.validate().is_err());

        bucket.chunk_size_bytes = crate::MAX_CHUNK_SIZE + 1;
        assert!(bucket.validate().is_err());

        for name in ["", " fs", "a/b", ".."] {
            let bucket = BucketConfig {
                name: name.to_string(),
                ..BucketConfig::default()
            };
            assert!(bucket.validate().is_err(), "{name:?} should be rejected");
        }
    }

    #[test]
    fn test_empty_paths_rejected() {
        let storage = StorageConfig::Filesystem {
            path: PathBuf::new(),
        };
        assert!(storage.validate().is_err());

        let catalog = CatalogConfig::Sqlite {
            path: PathBuf::new(),
            busy_timeout_secs: 1,
        };
        let err = AppConfig {
            catalog,
            ..AppConfig::for_testing()
        }
        .validate()
        .unwrap_err();
        assert!(err.starts_with("catalog:"));
    }
}
