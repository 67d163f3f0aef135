use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// One session's data as persisted in the backend.
///
/// Fields are keyed by the `type` part of the composite key and may be
/// partially populated. Blobs are opaque to the store and are written as
/// base64 strings inside a JSON document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDocument {
    pub id: String,
    #[serde(with = "blob_map")]
    pub fields: BTreeMap<String, Vec<u8>>,
    /// Relative TTL in seconds applied by the last write.
    pub expiry: u64,
}

impl SessionDocument {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn field(&self, kind: &str) -> Option<&[u8]> {
        self.fields.get(kind).map(Vec::as_slice)
    }

    pub fn set_field(&mut self, kind: &str, value: Vec<u8>) {
        self.fields.insert(kind.to_string(), value);
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

mod blob_map {
    use super::*;

    pub fn serialize<S>(fields: &BTreeMap<String, Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(fields.iter().map(|(k, v)| (k, STANDARD.encode(v))))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = BTreeMap::<String, String>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|(k, v)| {
                STANDARD
                    .decode(v.as_bytes())
                    .map(|bytes| (k, bytes))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}
