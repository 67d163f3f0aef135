use crate::connection::ConnectionDescriptor;
use std::future::Future;
use std::time::Duration;

/// Opaque version stamp of a stored document, changed by every write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cas(pub u64);

/// A document as returned by the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredDocument {
    pub content: Vec<u8>,
    pub cas: Cas,
}

/// Outcome of a backend operation that did not succeed.
///
/// `NotFound` is the expected "no session yet" case and is kept apart from
/// real failures so callers never have to inspect error text.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BucketError {
    #[error("document does not exist")]
    NotFound,

    #[error("document already exists")]
    Exists,

    #[error("document was modified concurrently")]
    CasMismatch,

    #[error("{0}")]
    Failure(String),
}

/// The key-value client a [`SessionAdapter`](crate::SessionAdapter) talks to.
///
/// Implementations must be safe to share between concurrently running
/// requests; the adapter adds no locking of its own.
pub trait Bucket: Send + Sync + 'static {
    /// Gets the document stored at `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<StoredDocument, BucketError>> + Send;

    /// Resets the expiry of the document at `key` to `ttl` from now.
    fn touch(&self, key: &str, ttl: Duration) -> impl Future<Output = Result<(), BucketError>> + Send;

    /// Creates the document at `key`, failing with [`BucketError::Exists`]
    /// if one is already there.
    fn insert(
        &self,
        key: &str,
        content: Vec<u8>,
        ttl: Duration,
    ) -> impl Future<Output = Result<Cas, BucketError>> + Send;

    /// Inserts or replaces the document at `key`.
    ///
    /// With `cas` set, the write only succeeds if the stored document still
    /// carries that CAS value; otherwise it fails with
    /// [`BucketError::CasMismatch`], or [`BucketError::NotFound`] if the
    /// document is gone.
    fn upsert(
        &self,
        key: &str,
        content: Vec<u8>,
        ttl: Duration,
        cas: Option<Cas>,
    ) -> impl Future<Output = Result<Cas, BucketError>> + Send;

    /// Removes the document at `key`.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), BucketError>> + Send;
}

/// Opens a [`Bucket`] from a connection descriptor. Called once at setup.
pub trait Connect {
    type Bucket: Bucket;

    fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> impl Future<Output = Result<Self::Bucket, BucketError>> + Send;
}
