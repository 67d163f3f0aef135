//! Connection descriptor construction.
//!
//! A [`SessionConfig`] is turned into a [`ConnectionDescriptor`] once at
//! setup. The descriptor renders the connection string handed to the
//! backend client:
//!
//! ```text
//! couchbase[s]://host1[,host2...]/bucket?config_node_timeout=<us>[&password=..][&certpath=..]
//! ```

use crate::config::{ConfigError, DEFAULT_BUCKET, MAX_TTL_SECS, SessionConfig};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::fmt;
use std::path::PathBuf;

const OPTION_VALUE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

const MICROS_PER_SEC: u64 = 1_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheme {
    Plain,
    Encrypted,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Plain => "couchbase",
            Scheme::Encrypted => "couchbases",
        }
    }
}

/// Immutable connection settings derived from a [`SessionConfig`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    scheme: Scheme,
    hosts: String,
    bucket: String,
    password: Option<String>,
    certpath: Option<PathBuf>,
    timeout_secs: u64,
}

impl ConnectionDescriptor {
    /// Validates `config` and builds the descriptor.
    ///
    /// Requesting `ssl` without an existing certificate file is fatal; no
    /// descriptor is produced in that case.
    pub fn build(config: &SessionConfig) -> Result<Self, ConfigError> {
        let hosts = validate_hosts(&config.server)?;

        if config.timeout == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        if !(1..=MAX_TTL_SECS).contains(&config.default_ttl) {
            return Err(ConfigError::InvalidTtl(config.default_ttl));
        }

        let (scheme, certpath) = if config.ssl {
            let path = config
                .certpath
                .as_ref()
                .filter(|p| !p.as_os_str().is_empty())
                .ok_or(ConfigError::MissingCertificate)?;
            if !path.is_file() {
                return Err(ConfigError::CertificateNotFound(path.clone()));
            }
            (Scheme::Encrypted, Some(path.clone()))
        } else {
            (Scheme::Plain, None)
        };

        let bucket = validate_bucket(&config.bucket)?;

        Ok(Self {
            scheme,
            hosts,
            bucket,
            password: config.password.clone().filter(|p| !p.is_empty()),
            certpath,
            timeout_secs: config.timeout,
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Hosts exactly as given in the `server` option.
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.hosts.split(',')
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn certpath(&self) -> Option<&PathBuf> {
        self.certpath.as_ref()
    }

    pub fn timeout_micros(&self) -> u64 {
        self.timeout_secs.saturating_mul(MICROS_PER_SEC)
    }

    /// The full connection string, credentials included.
    pub fn connection_string(&self) -> String {
        self.render(false)
    }

    fn render(&self, redact: bool) -> String {
        let mut out = format!(
            "{}://{}/{}?config_node_timeout={}",
            self.scheme.as_str(),
            self.hosts,
            self.bucket,
            self.timeout_micros()
        );

        if let Some(password) = &self.password {
            out.push_str("&password=");
            if redact {
                out.push_str("***");
            } else {
                out.extend(utf8_percent_encode(password, OPTION_VALUE));
            }
        }

        if let Some(certpath) = &self.certpath {
            out.push_str("&certpath=");
            out.extend(utf8_percent_encode(&certpath.to_string_lossy(), OPTION_VALUE));
        }

        out
    }
}

/// Renders the connection string with the password redacted, for logs.
impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(true))
    }
}

fn validate_hosts(server: &str) -> Result<String, ConfigError> {
    if server.is_empty() {
        return Err(ConfigError::MissingServer);
    }

    let malformed = server.split(',').any(|host| {
        host.is_empty()
            || host
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '&' | '#'))
    });

    if malformed {
        return Err(ConfigError::MalformedServer(server.to_string()));
    }

    Ok(server.to_string())
}

fn validate_bucket(bucket: &str) -> Result<String, ConfigError> {
    if bucket.is_empty() {
        return Ok(DEFAULT_BUCKET.to_string());
    }

    let valid = bucket
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if !valid {
        return Err(ConfigError::MalformedBucket(bucket.to_string()));
    }

    Ok(bucket.to_string())
}
