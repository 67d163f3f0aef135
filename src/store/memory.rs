use crate::connection::ConnectionDescriptor;
use crate::store::{Bucket, BucketError, Cas, Connect, StoredDocument};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct StoredValue {
    content: Vec<u8>,
    cas: Cas,
    expires_at: Instant,
}

impl StoredValue {
    fn is_live(&self) -> bool {
        self.expires_at > Instant::now()
    }
}

/// An in-memory bucket implementation.
///
/// Documents expire lazily once their TTL has elapsed. Clones share the same
/// underlying data.
///
/// ### Note
///
/// Do not use this in a production environment.
#[derive(Debug, Clone, Default)]
pub struct MemoryBucket {
    data: Arc<DashMap<String, StoredValue>>,
    next_cas: Arc<AtomicU64>,
}

impl MemoryBucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live documents.
    pub fn len(&self) -> usize {
        self.cleanup_expired();
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining lifetime of the document at `key`, if it exists.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.data
            .get(key)
            .filter(|value| value.is_live())
            .map(|value| value.expires_at.saturating_duration_since(Instant::now()))
    }

    fn cleanup_expired(&self) {
        self.data.retain(|_, value| value.is_live());
    }

    fn deadline(ttl: Duration) -> Result<Instant, BucketError> {
        Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| BucketError::Failure(format!("ttl of {}s is out of range", ttl.as_secs())))
    }

    fn cas(&self) -> Cas {
        Cas(self.next_cas.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn live(&self, key: &str) -> Result<StoredDocument, BucketError> {
        match self.data.get(key) {
            Some(value) if value.is_live() => Ok(StoredDocument {
                content: value.content.clone(),
                cas: value.cas,
            }),
            _ => Err(BucketError::NotFound),
        }
    }
}

impl Bucket for MemoryBucket {
    async fn get(&self, key: &str) -> Result<StoredDocument, BucketError> {
        self.cleanup_expired();
        self.live(key)
    }

    async fn touch(&self, key: &str, ttl: Duration) -> Result<(), BucketError> {
        self.cleanup_expired();
        let expires_at = Self::deadline(ttl)?;

        match self.data.get_mut(key) {
            Some(mut value) if value.is_live() => {
                value.expires_at = expires_at;
                Ok(())
            }
            _ => Err(BucketError::NotFound),
        }
    }

    async fn insert(&self, key: &str, content: Vec<u8>, ttl: Duration) -> Result<Cas, BucketError> {
        self.cleanup_expired();
        let cas = self.cas();
        let stored = StoredValue {
            content,
            cas,
            expires_at: Self::deadline(ttl)?,
        };

        match self.data.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_live() {
                    return Err(BucketError::Exists);
                }
                entry.insert(stored);
            }
            Entry::Vacant(entry) => {
                entry.insert(stored);
            }
        }

        Ok(cas)
    }

    async fn upsert(
        &self,
        key: &str,
        content: Vec<u8>,
        ttl: Duration,
        cas: Option<Cas>,
    ) -> Result<Cas, BucketError> {
        self.cleanup_expired();
        let new_cas = self.cas();
        let stored = StoredValue {
            content,
            cas: new_cas,
            expires_at: Self::deadline(ttl)?,
        };

        match (self.data.entry(key.to_string()), cas) {
            (Entry::Occupied(mut entry), Some(expected)) => {
                if !entry.get().is_live() {
                    entry.remove();
                    return Err(BucketError::NotFound);
                }
                if entry.get().cas != expected {
                    return Err(BucketError::CasMismatch);
                }
                entry.insert(stored);
            }
            (Entry::Vacant(_), Some(_)) => return Err(BucketError::NotFound),
            (Entry::Occupied(mut entry), None) => {
                entry.insert(stored);
            }
            (Entry::Vacant(entry), None) => {
                entry.insert(stored);
            }
        }

        Ok(new_cas)
    }

    async fn remove(&self, key: &str) -> Result<(), BucketError> {
        self.cleanup_expired();
        match self.data.remove(key) {
            Some((_, value)) if value.is_live() => Ok(()),
            _ => Err(BucketError::NotFound),
        }
    }
}

/// Hands out a [`MemoryBucket`] regardless of the descriptor's hosts.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    bucket: MemoryBucket,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects to an existing bucket, sharing its data.
    pub fn with_bucket(bucket: MemoryBucket) -> Self {
        Self { bucket }
    }
}

impl Connect for MemoryConnector {
    type Bucket = MemoryBucket;

    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<MemoryBucket, BucketError> {
        tracing::debug!(bucket = descriptor.bucket(), "opening in-memory bucket");
        Ok(self.bucket.clone())
    }
}
