mod bucket_trait;
pub use bucket_trait::*;

mod document;
pub use document::SessionDocument;

pub mod memory;

use crate::config::ConfigError;
use crate::key::KeyError;
use serde::{Serialize, de::DeserializeOwned};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to connect to the session backend: {0}")]
    Connect(String),

    #[error("invalid session key: {0}")]
    InvalidKey(#[from] KeyError),

    #[error("session backend failed for key {key:?}: {message}")]
    Backend { key: String, message: String },

    #[error("session document {key:?} kept changing after {attempts} write attempts")]
    Conflict { key: String, attempts: u32 },

    #[error("Encoding failed with: {0}")]
    Encode(String),

    #[error("Decoding failed with: {0}")]
    Decode(String),
}

impl Error {
    pub(crate) fn backend(key: &str, message: impl ToString) -> Self {
        Error::Backend {
            key: key.to_string(),
            message: message.to_string(),
        }
    }
}

#[cfg(feature = "bincode")]
pub(crate) fn serialize_value<T: Serialize>(value: &T) -> Result<Vec<u8>, Error> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| Error::Encode(e.to_string()))
}

#[cfg(feature = "bincode")]
pub(crate) fn deserialize_value<T: DeserializeOwned>(value: &[u8]) -> Result<T, Error> {
    bincode::serde::decode_from_slice(value, bincode::config::standard())
        .map(|(value, _)| value)
        .map_err(|e| Error::Decode(e.to_string()))
}

#[cfg(all(feature = "messagepack", not(feature = "bincode")))]
pub(crate) fn serialize_value<T: Serialize>(value: &T) -> Result<Vec<u8>, Error> {
    rmp_serde::to_vec(value).map_err(|e| Error::Encode(e.to_string()))
}

#[cfg(all(feature = "messagepack", not(feature = "bincode")))]
pub(crate) fn deserialize_value<T: DeserializeOwned>(value: &[u8]) -> Result<T, Error> {
    rmp_serde::from_slice(value).map_err(|e| Error::Decode(e.to_string()))
}
