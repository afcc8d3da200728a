//! In-process storage backend.

use crate::error::{StorageError, StorageResult};
use crate::traits::{KeyStream, ObjectMeta, ObjectStore};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::instrument;

struct StoredObject {
    data: Bytes,
    modified: OffsetDateTime,
}

/// Object store held entirely in memory, ordered by key.
///
/// Nothing survives process exit. Used for tests and ephemeral buckets.
#[derive(Default)]
pub struct MemoryBackend {
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    fn validate_key(key: &str) -> StorageResult<()> {
        if key.is_empty() || key.ends_with('/') || key.contains('\0') {
            return Err(StorageError::InvalidKey(format!(
                "not an object key: {key:?}"
            )));
        }
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.objects
            .read()
            .await
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|obj| ObjectMeta {
                size: obj.data.len() as u64,
                last_modified: Some(obj.modified),
            })
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|obj| obj.data.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    #[instrument(skip(self, data), fields(backend = "memory", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        Self::validate_key(key)?;
        let object = StoredObject {
            data,
            modified: OffsetDateTime::now_utc(),
        };
        self.objects.write().await.insert(key.to_string(), object);
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.objects
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        Ok(self.keys_with_prefix(prefix).await)
    }

    async fn list_stream(&self, prefix: &str) -> StorageResult<KeyStream> {
        // Snapshot so the stream does not hold the lock across yields.
        let keys = self.keys_with_prefix(prefix).await;
        Ok(Box::pin(futures::stream::iter(keys.into_iter().map(Ok))))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
