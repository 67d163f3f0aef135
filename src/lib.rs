//! # Couchsess: document-backed session storage
//!
//! `couchsess` persists a web application's session data in a
//! Couchbase-style key-value bucket. The host framework owns the session
//! lifecycle and calls into a [`SessionAdapter`] with composite keys of the
//! shape `type:id`:
//!
//! - the `id` names the session and becomes the storage key, prefixed with
//!   `"<app_identity>sess:"` so several applications can share one bucket;
//! - the `type` (e.g. `session`, `flash`) names a field inside the session's
//!   single JSON document.
//!
//! Expiry is delegated to the backend's TTL. Every write sets a TTL, and
//! every read refreshes it.
//!
//! # Quick Start
//!
//! ```rust
//! use couchsess::{SessionAdapter, SessionConfig};
//! use couchsess::store::memory::MemoryConnector;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = SessionConfig::from_json(r#"{"server": "localhost", "bucket": "sessions"}"#)
//!         .unwrap();
//!
//!     let sessions = SessionAdapter::setup(&config, &MemoryConnector::new())
//!         .await
//!         .unwrap();
//!     assert_eq!(
//!         sessions.connection_string(),
//!         "couchbase://localhost/sessions?config_node_timeout=6000000"
//!     );
//!
//!     sessions.store("session:abc123", b"payload".to_vec(), None).await.unwrap();
//!     let payload = sessions.get("session:abc123").await.unwrap();
//!     assert_eq!(payload.as_deref(), Some(&b"payload"[..]));
//! }
//! ```
//!
//! # Backends
//!
//! The adapter is generic over [`store::Bucket`], the get / touch /
//! insert / upsert / remove contract of a document key-value client, and is
//! opened through a [`store::Connect`] implementation that receives the
//! [`ConnectionDescriptor`] built from the configuration.
//! [`store::memory::MemoryBucket`] is provided for development and tests.
//!
//! # Concurrent writes
//!
//! By default (`WriteMode::Merge`) a store reads the session document, sets
//! one field and upserts the whole document. Two requests writing different
//! fields of the same session at the same time can lose one of the fields.
//! `WriteMode::CompareAndSwap` writes back with the document's CAS value and
//! retries a bounded number of times instead.
//!
//! ## Serialization
//!
//! Payloads handed to [`SessionAdapter::store`] are opaque bytes. The typed
//! helpers [`SessionAdapter::store_value`] and [`SessionAdapter::get_value`]
//! encode with either:
//!
//! - [`bincode`](https://crates.io/crates/bincode) (default)
//! - [`rmp-serde`](https://crates.io/crates/rmp-serde) (MessagePack), with
//!   `default-features = false, features = ["messagepack"]`.

mod adapter;
pub use adapter::*;

mod config;
pub use config::*;

mod connection;
pub use connection::*;

mod key;
pub use key::*;

pub mod store;
