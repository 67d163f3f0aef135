//! The session store adapter the host framework calls into.

use crate::config::{SessionConfig, WriteMode};
use crate::connection::ConnectionDescriptor;
use crate::key::{CompositeKey, KeyPrefix};
use crate::store::{
    Bucket, BucketError, Cas, Connect, Error, SessionDocument, deserialize_value, serialize_value,
};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

type Result<T> = std::result::Result<T, Error>;

/// Persists session data in a document-oriented key-value bucket.
///
/// One document is kept per session id; the `type` half of a `type:id` key
/// names a field inside that document. Expiry is left to the backend's TTL,
/// so [`SessionAdapter::expire_sweep`] does nothing.
///
/// The adapter is built once at startup and shared by reference (or cheap
/// clone) with request handlers.
///
/// # Example
///
/// ```rust
/// use couchsess::{SessionAdapter, SessionConfig};
/// use couchsess::store::memory::MemoryConnector;
/// use time::{Duration, OffsetDateTime};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), couchsess::store::Error> {
/// let config = SessionConfig::build("localhost").app_identity("shop");
/// let sessions = SessionAdapter::setup(&config, &MemoryConnector::new()).await?;
///
/// let expires_at = OffsetDateTime::now_utc() + Duration::minutes(30);
/// sessions.store("session:abc123", b"blob".to_vec(), Some(expires_at)).await?;
/// assert_eq!(sessions.get("session:abc123").await?, Some(b"blob".to_vec()));
/// assert_eq!(sessions.get("flash:abc123").await?, None);
///
/// sessions.delete("session:abc123").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SessionAdapter<B: Bucket> {
    bucket: Arc<B>,
    prefix: KeyPrefix,
    descriptor: ConnectionDescriptor,
    default_ttl: Duration,
    write_mode: WriteMode,
}

impl<B: Bucket> Clone for SessionAdapter<B> {
    fn clone(&self) -> Self {
        Self {
            bucket: Arc::clone(&self.bucket),
            prefix: self.prefix.clone(),
            descriptor: self.descriptor.clone(),
            default_ttl: self.default_ttl,
            write_mode: self.write_mode,
        }
    }
}

impl<B: Bucket> SessionAdapter<B> {
    /// Validates `config`, opens the bucket through `connector` and computes
    /// the key prefix.
    ///
    /// Any failure here is fatal: the host must not start serving requests
    /// without a working session backend.
    #[tracing::instrument(name = "setting up session store", skip_all, fields(server = %config.server))]
    pub async fn setup<C>(config: &SessionConfig, connector: &C) -> Result<Self>
    where
        C: Connect<Bucket = B>,
    {
        let descriptor = ConnectionDescriptor::build(config).map_err(|err| {
            tracing::error!(err = %err, "invalid session store configuration");
            err
        })?;

        let bucket = connector.connect(&descriptor).await.map_err(|err| {
            tracing::error!(err = %err, connection = %descriptor, "failed to open session bucket");
            Error::Connect(err.to_string())
        })?;

        tracing::info!(connection = %descriptor, "session store ready");

        Ok(Self::from_parts(Arc::new(bucket), descriptor, config))
    }

    /// Wraps an already opened bucket.
    pub fn new(bucket: Arc<B>, config: &SessionConfig) -> Result<Self> {
        let descriptor = ConnectionDescriptor::build(config)?;
        Ok(Self::from_parts(bucket, descriptor, config))
    }

    fn from_parts(bucket: Arc<B>, descriptor: ConnectionDescriptor, config: &SessionConfig) -> Self {
        Self {
            bucket,
            prefix: KeyPrefix::new(&config.app_identity),
            descriptor,
            default_ttl: Duration::from_secs(config.default_ttl),
            write_mode: config.write_mode,
        }
    }

    pub fn bucket(&self) -> &B {
        &self.bucket
    }

    pub fn key_prefix(&self) -> &KeyPrefix {
        &self.prefix
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    pub fn connection_string(&self) -> String {
        self.descriptor.connection_string()
    }

    /// Reads the field named by `key` and refreshes the session's TTL.
    ///
    /// The TTL is reset to the lifetime set by the last write, so a read
    /// never shortens a long-lived session. Returns `None` when the session
    /// or the field does not exist.
    #[tracing::instrument(name = "getting session data", skip(self))]
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = CompositeKey::parse(key)?;
        let storage_key = self.prefix.storage_key(key.id());

        let stored = match self.bucket.get(&storage_key).await {
            Ok(stored) => stored,
            Err(BucketError::NotFound) => {
                tracing::debug!(key = %storage_key, "no session document");
                return Ok(None);
            }
            Err(err) => {
                tracing::error!(err = %err, key = %storage_key, "failed to get session document");
                return Err(Error::backend(&storage_key, err));
            }
        };

        let mut document = SessionDocument::from_json(&stored.content).map_err(|err| {
            tracing::error!(err = %err, key = %storage_key, "failed to decode session document");
            Error::backend(&storage_key, err)
        })?;

        let lifetime = match document.expiry {
            0 => self.default_ttl,
            seconds => Duration::from_secs(seconds),
        };

        match self.bucket.touch(&storage_key, lifetime).await {
            Ok(()) => Ok(document.fields.remove(key.kind())),
            Err(BucketError::NotFound) => {
                tracing::debug!(key = %storage_key, "session document expired while reading");
                Ok(None)
            }
            Err(err) => {
                tracing::error!(err = %err, key = %storage_key, "failed to refresh session ttl");
                Err(Error::backend(&storage_key, err))
            }
        }
    }

    /// Writes `value` into the field named by `key`.
    ///
    /// The document TTL is the time left until `expires_at`. When that is
    /// unset or already past, the configured default TTL is used instead.
    #[tracing::instrument(name = "storing session data", skip(self, value))]
    pub async fn store(
        &self,
        key: &str,
        value: Vec<u8>,
        expires_at: Option<OffsetDateTime>,
    ) -> Result<()> {
        let key = CompositeKey::parse(key)?;
        let storage_key = self.prefix.storage_key(key.id());
        let ttl = self.ttl_until(expires_at);
        let value_len = value.len();

        let result = match self.write_mode {
            WriteMode::Merge => self.merge(&storage_key, key.kind(), value, ttl).await,
            WriteMode::CompareAndSwap { max_attempts } => {
                self.compare_and_swap(&storage_key, key.kind(), value, ttl, max_attempts)
                    .await
            }
        };

        result.map_err(|err| {
            tracing::error!(
                err = %err,
                key = %storage_key,
                field = key.kind(),
                value_len,
                "failed to store session document"
            );
            err
        })
    }

    /// Removes the whole session document.
    ///
    /// Backend failures, including a missing document, are ignored; only an
    /// invalid key is reported.
    #[tracing::instrument(name = "deleting session", skip(self))]
    pub async fn delete(&self, key: &str) -> Result<()> {
        let key = CompositeKey::parse(key)?;
        let storage_key = self.prefix.storage_key(key.id());

        if let Err(err) = self.bucket.remove(&storage_key).await {
            tracing::debug!(err = %err, key = %storage_key, "ignoring failed session removal");
        }

        Ok(())
    }

    /// Expired sessions are dropped by the backend's TTL; nothing to sweep.
    pub fn expire_sweep(&self) {}

    /// Reads a field and decodes it with the crate's value codec.
    pub async fn get_value<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        match self.get(key).await? {
            Some(bytes) => Ok(Some(deserialize_value(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Encodes `value` with the crate's value codec and stores it.
    pub async fn store_value<T>(
        &self,
        key: &str,
        value: &T,
        expires_at: Option<OffsetDateTime>,
    ) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let bytes = serialize_value(value)?;
        self.store(key, bytes, expires_at).await
    }

    fn ttl_until(&self, expires_at: Option<OffsetDateTime>) -> Duration {
        let remaining = expires_at
            .map(|at| (at - OffsetDateTime::now_utc()).whole_seconds())
            .unwrap_or(0);

        if remaining > 0 {
            Duration::from_secs(remaining as u64)
        } else {
            tracing::warn!(
                default_ttl = self.default_ttl.as_secs(),
                "no session expiry configured, falling back to the default TTL"
            );
            self.default_ttl
        }
    }

    async fn merge(&self, storage_key: &str, kind: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let value_len = value.len();
        let mut document = match self.bucket.get(storage_key).await {
            Ok(stored) => SessionDocument::from_json(&stored.content).unwrap_or_else(|err| {
                tracing::warn!(err = %err, key = %storage_key, "discarding undecodable session document");
                SessionDocument::new(storage_key)
            }),
            Err(BucketError::NotFound) => SessionDocument::new(storage_key),
            Err(err) => {
                tracing::warn!(err = %err, key = %storage_key, "failed to read session document, starting empty");
                SessionDocument::new(storage_key)
            }
        };

        document.set_field(kind, value);
        document.expiry = ttl.as_secs();

        let content = document
            .to_json()
            .map_err(|err| Error::Encode(err.to_string()))?;

        self.bucket
            .upsert(storage_key, content, ttl, None)
            .await
            .map_err(|err| Error::backend(storage_key, write_context(&err, kind, value_len)))?;

        Ok(())
    }

    async fn compare_and_swap(
        &self,
        storage_key: &str,
        kind: &str,
        value: Vec<u8>,
        ttl: Duration,
        max_attempts: u32,
    ) -> Result<()> {
        let max_attempts = max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let (mut document, cas): (SessionDocument, Option<Cas>) =
                match self.bucket.get(storage_key).await {
                    Ok(stored) => (
                        SessionDocument::from_json(&stored.content)
                            .map_err(|err| Error::backend(storage_key, err))?,
                        Some(stored.cas),
                    ),
                    Err(BucketError::NotFound) => (SessionDocument::new(storage_key), None),
                    Err(err) => return Err(Error::backend(storage_key, err)),
                };

            document.set_field(kind, value.clone());
            document.expiry = ttl.as_secs();

            let content = document
                .to_json()
                .map_err(|err| Error::Encode(err.to_string()))?;

            let written = match cas {
                Some(cas) => self.bucket.upsert(storage_key, content, ttl, Some(cas)).await,
                None => self.bucket.insert(storage_key, content, ttl).await,
            };

            match written {
                Ok(_) => return Ok(()),
                Err(BucketError::CasMismatch | BucketError::Exists | BucketError::NotFound) => {
                    tracing::debug!(key = %storage_key, attempt, "session document changed concurrently, retrying");
                }
                Err(err) => {
                    return Err(Error::backend(
                        storage_key,
                        write_context(&err, kind, value.len()),
                    ));
                }
            }
        }

        Err(Error::Conflict {
            key: storage_key.to_string(),
            attempts: max_attempts,
        })
    }
}

fn write_context(err: &BucketError, kind: &str, value_len: usize) -> String {
    format!("{err} (field {kind:?}, {value_len} bytes)")
}
