//! Composite key handling.
//!
//! The host addresses session data with keys of the shape `type:id`. The
//! `id` selects the backend document, the `type` selects the field inside it.

use std::fmt;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("session key is empty")]
    Empty,

    #[error("session key {0:?} has no `type:id` separator")]
    MissingSeparator(String),

    #[error("session key {0:?} has an empty type")]
    EmptyType(String),

    #[error("session key {0:?} has an empty id")]
    EmptyId(String),
}

/// A parsed `type:id` key borrowed from the caller's string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompositeKey<'a> {
    kind: &'a str,
    id: &'a str,
}

impl<'a> CompositeKey<'a> {
    /// Splits `raw` on its first `:`. Both halves must be non-empty.
    pub fn parse(raw: &'a str) -> Result<Self, KeyError> {
        if raw.is_empty() {
            return Err(KeyError::Empty);
        }

        let (kind, id) = raw
            .split_once(':')
            .ok_or_else(|| KeyError::MissingSeparator(raw.to_string()))?;

        if kind.is_empty() {
            return Err(KeyError::EmptyType(raw.to_string()));
        }
        if id.is_empty() {
            return Err(KeyError::EmptyId(raw.to_string()));
        }

        Ok(Self { kind, id })
    }

    /// The field selector, e.g. `session` or `flash`.
    pub fn kind(&self) -> &'a str {
        self.kind
    }

    pub fn id(&self) -> &'a str {
        self.id
    }
}

/// Namespace prepended to every storage key, `"<app_identity>sess:"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPrefix(String);

impl KeyPrefix {
    pub fn new(app_identity: &str) -> Self {
        Self(format!("{app_identity}sess:"))
    }

    /// The only key shape ever sent to the backend.
    pub fn storage_key(&self, id: &str) -> String {
        let mut key = String::with_capacity(self.0.len() + id.len());
        key.push_str(&self.0);
        key.push_str(id);
        key
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
