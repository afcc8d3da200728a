use async_trait::async_trait;
use bytes::Bytes;
use chunkvault_storage::{KeyStream, ObjectMeta, ObjectStore, StorageError, StorageResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Wraps an object store and fails `put` calls on demand.
///
/// With `fail_after(n)`, the first `n` puts succeed and every later put fails
/// with an I/O error until `heal()` is called.
pub struct FlakyStore {
    inner: Arc<dyn ObjectStore>,
    puts: AtomicUsize,
    fail_after: AtomicUsize,
    failing: AtomicBool,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            puts: AtomicUsize::new(0),
            fail_after: AtomicUsize::new(usize::MAX),
            failing: AtomicBool::new(false),
        })
    }

    pub fn fail_after(&self, puts: usize) {
        self.puts.store(0, Ordering::SeqCst);
        self.fail_after.store(puts, Ordering::SeqCst);
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for FlakyStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        self.inner.head(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let attempt = self.puts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) && attempt >= self.fail_after.load(Ordering::SeqCst)
        {
            return Err(StorageError::Io(std::io::Error::other(format!(
                "injected put failure for {key}"
            ))));
        }
        self.inner.put(key, data).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list(prefix).await
    }

    async fn list_stream(&self, prefix: &str) -> StorageResult<KeyStream> {
        self.inner.list_stream(prefix).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}
