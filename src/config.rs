use serde::Deserialize;
use std::path::PathBuf;

pub(crate) const DEFAULT_BUCKET: &str = "default";
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 6;
pub(crate) const DEFAULT_TTL_SECS: u64 = 3600;
pub(crate) const DEFAULT_CAS_ATTEMPTS: u32 = 3;
/// Longest relative TTL a Couchbase bucket accepts; larger values are read
/// as absolute Unix timestamps.
pub(crate) const MAX_TTL_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("the `server` option is required")]
    MissingServer,

    #[error("malformed server list: {0:?}")]
    MalformedServer(String),

    #[error("`ssl` is enabled but no `certpath` was given")]
    MissingCertificate,

    #[error("certificate file {0:?} does not exist")]
    CertificateNotFound(PathBuf),

    #[error("malformed bucket name: {0:?}")]
    MalformedBucket(String),

    #[error("`timeout` must be greater than zero")]
    InvalidTimeout,

    #[error("`default_ttl` must be between 1 and 2592000 seconds, got {0}")]
    InvalidTtl(u64),

    #[error("failed to parse session configuration: {0}")]
    Parse(String),
}

/// How `store` writes a field back into the session document.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum WriteMode {
    /// Read the document, set the field and upsert the result.
    ///
    /// Two concurrent stores of different fields under the same session id
    /// race; the later upsert wins and the earlier field is lost.
    #[default]
    Merge,
    /// Read the document with its CAS value and write it back only if it
    /// has not changed in between, retrying up to `max_attempts` times.
    CompareAndSwap {
        #[serde(default = "default_cas_attempts")]
        max_attempts: u32,
    },
}

/// The configuration bundle handed over by the host application at setup.
///
/// # Example
///
/// ```rust
/// use couchsess::SessionConfig;
///
/// let config = SessionConfig::build("node1,node2")
///     .bucket("sessions")
///     .password("s3cret")
///     .timeout(10)
///     .app_identity("shop");
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    pub server: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default)]
    pub certpath: Option<PathBuf>,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub app_identity: String,
    #[serde(default = "default_ttl")]
    pub default_ttl: u64,
    #[serde(default)]
    pub write_mode: WriteMode,
}

fn default_bucket() -> String {
    DEFAULT_BUCKET.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_ttl() -> u64 {
    DEFAULT_TTL_SECS
}

fn default_cas_attempts() -> u32 {
    DEFAULT_CAS_ATTEMPTS
}

impl SessionConfig {
    /// Creates a configuration for `server` with every other option at its default.
    pub fn build(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            bucket: default_bucket(),
            password: None,
            ssl: false,
            certpath: None,
            timeout: DEFAULT_TIMEOUT_SECS,
            app_identity: String::new(),
            default_ttl: DEFAULT_TTL_SECS,
            write_mode: WriteMode::Merge,
        }
    }

    /// Parses a JSON configuration bundle.
    ///
    /// A bundle without a `server` entry yields [`ConfigError::MissingServer`].
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;

        if value.get("server").is_none_or(|server| server.is_null()) {
            return Err(ConfigError::MissingServer);
        }

        serde_json::from_value(value).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Enables the encrypted scheme. `certpath` must point at an existing file.
    pub fn ssl(mut self, certpath: impl Into<PathBuf>) -> Self {
        self.ssl = true;
        self.certpath = Some(certpath.into());
        self
    }

    /// Sets the node bootstrap timeout in seconds.
    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    pub fn app_identity(mut self, identity: impl Into<String>) -> Self {
        self.app_identity = identity.into();
        self
    }

    /// Sets the TTL used when the host supplies no usable expiry.
    pub fn default_ttl(mut self, seconds: u64) -> Self {
        self.default_ttl = seconds;
        self
    }

    pub fn write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }
}
