#![allow(dead_code)]

use couchsess::ConnectionDescriptor;
use couchsess::store::memory::MemoryBucket;
use couchsess::store::{Bucket, BucketError, Cas, Connect, StoredDocument};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Forwards to a [`MemoryBucket`] while counting calls and recording the
/// TTL of every write.
#[derive(Debug, Clone, Default)]
pub struct CountingBucket {
    pub inner: MemoryBucket,
    calls: Arc<AtomicUsize>,
    write_ttls: Arc<Mutex<Vec<Duration>>>,
}

impl CountingBucket {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn write_ttls(&self) -> Vec<Duration> {
        self.write_ttls.lock().clone()
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl Bucket for CountingBucket {
    async fn get(&self, key: &str) -> Result<StoredDocument, BucketError> {
        self.hit();
        self.inner.get(key).await
    }

    async fn touch(&self, key: &str, ttl: Duration) -> Result<(), BucketError> {
        self.hit();
        self.inner.touch(key, ttl).await
    }

    async fn insert(&self, key: &str, content: Vec<u8>, ttl: Duration) -> Result<Cas, BucketError> {
        self.hit();
        self.write_ttls.lock().push(ttl);
        self.inner.insert(key, content, ttl).await
    }

    async fn upsert(
        &self,
        key: &str,
        content: Vec<u8>,
        ttl: Duration,
        cas: Option<Cas>,
    ) -> Result<Cas, BucketError> {
        self.hit();
        self.write_ttls.lock().push(ttl);
        self.inner.upsert(key, content, ttl, cas).await
    }

    async fn remove(&self, key: &str) -> Result<(), BucketError> {
        self.hit();
        self.inner.remove(key).await
    }
}

/// Fails every operation with the given error.
#[derive(Debug, Clone)]
pub struct FailingBucket(pub BucketError);

impl Bucket for FailingBucket {
    async fn get(&self, _key: &str) -> Result<StoredDocument, BucketError> {
        Err(self.0.clone())
    }

    async fn touch(&self, _key: &str, _ttl: Duration) -> Result<(), BucketError> {
        Err(self.0.clone())
    }

    async fn insert(&self, _key: &str, _content: Vec<u8>, _ttl: Duration) -> Result<Cas, BucketError> {
        Err(self.0.clone())
    }

    async fn upsert(
        &self,
        _key: &str,
        _content: Vec<u8>,
        _ttl: Duration,
        _cas: Option<Cas>,
    ) -> Result<Cas, BucketError> {
        Err(self.0.clone())
    }

    async fn remove(&self, _key: &str) -> Result<(), BucketError> {
        Err(self.0.clone())
    }
}

/// Refuses to connect, recording the descriptor it was handed.
#[derive(Debug, Default)]
pub struct RefusingConnector {
    pub seen: Mutex<Option<String>>,
}

impl Connect for RefusingConnector {
    type Bucket = FailingBucket;

    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<FailingBucket, BucketError> {
        *self.seen.lock() = Some(descriptor.connection_string());
        Err(BucketError::Failure("connection refused".to_string()))
    }
}

/// Forwards to a [`MemoryBucket`] but rejects the first `conflicts` guarded
/// writes as if another writer got there first.
#[derive(Debug, Clone, Default)]
pub struct ContendedBucket {
    pub inner: MemoryBucket,
    conflicts: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
}

impl ContendedBucket {
    pub fn new(conflicts: usize) -> Self {
        Self {
            conflicts: Arc::new(AtomicUsize::new(conflicts)),
            ..Default::default()
        }
    }

    /// Number of insert/upsert calls seen, rejected ones included.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn conflict(&self) -> bool {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Bucket for ContendedBucket {
    async fn get(&self, key: &str) -> Result<StoredDocument, BucketError> {
        self.inner.get(key).await
    }

    async fn touch(&self, key: &str, ttl: Duration) -> Result<(), BucketError> {
        self.inner.touch(key, ttl).await
    }

    async fn insert(&self, key: &str, content: Vec<u8>, ttl: Duration) -> Result<Cas, BucketError> {
        if self.conflict() {
            return Err(BucketError::Exists);
        }
        self.inner.insert(key, content, ttl).await
    }

    async fn upsert(
        &self,
        key: &str,
        content: Vec<u8>,
        ttl: Duration,
        cas: Option<Cas>,
    ) -> Result<Cas, BucketError> {
        if cas.is_some() && self.conflict() {
            return Err(BucketError::CasMismatch);
        }
        self.inner.upsert(key, content, ttl, cas).await
    }

    async fn remove(&self, key: &str) -> Result<(), BucketError> {
        self.inner.remove(key).await
    }
}

/// Forwards to a [`MemoryBucket`], holding the first two reads until both
/// have arrived so two writers see the same document.
#[derive(Debug, Clone)]
pub struct RacingBucket {
    pub inner: MemoryBucket,
    gate: Arc<tokio::sync::Barrier>,
    reads: Arc<AtomicUsize>,
}

impl Default for RacingBucket {
    fn default() -> Self {
        Self {
            inner: MemoryBucket::new(),
            gate: Arc::new(tokio::sync::Barrier::new(2)),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Bucket for RacingBucket {
    async fn get(&self, key: &str) -> Result<StoredDocument, BucketError> {
        let result = self.inner.get(key).await;
        if self.reads.fetch_add(1, Ordering::SeqCst) < 2 {
            self.gate.wait().await;
        }
        result
    }

    async fn touch(&self, key: &str, ttl: Duration) -> Result<(), BucketError> {
        self.inner.touch(key, ttl).await
    }

    async fn insert(&self, key: &str, content: Vec<u8>, ttl: Duration) -> Result<Cas, BucketError> {
        self.inner.insert(key, content, ttl).await
    }

    async fn upsert(
        &self,
        key: &str,
        content: Vec<u8>,
        ttl: Duration,
        cas: Option<Cas>,
    ) -> Result<Cas, BucketError> {
        self.inner.upsert(key, content, ttl, cas).await
    }

    async fn remove(&self, key: &str) -> Result<(), BucketError> {
        self.inner.remove(key).await
    }
}
