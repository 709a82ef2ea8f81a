//! Storage port consumed by the cache client.
//!
//! The client never stores anything itself. Persistence, eviction policy
//! (LRU, LFU, TTL sweeps, ...) and the synchronization those need all live
//! behind [`Adapter`].

use thiserror::Error;

/// Failures reported by a storage backend.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A byte-oriented store addressed by `(prefix, key)`.
///
/// `prefix` groups every variant of a route (it is the request path) and `key`
/// identifies one variant. Values are opaque encoded
/// [`Envelope`](super::Envelope)s.
///
/// # Contract
///
/// - Implementations are shared across request tasks without external locking
///   and must synchronize internally.
/// - [`set`](Self::set) overwrites whatever is stored under the key.
/// - Releasing something that is not stored is a no-op, not an error.
pub trait Adapter: Send + Sync {
    /// Returns the bytes stored under the key, or `None` if absent.
    fn get(&self, prefix: &str, key: &str) -> Result<Option<Vec<u8>>, AdapterError>;

    /// Stores `value` under the key.
    fn set(&self, prefix: &str, key: &str, value: Vec<u8>) -> Result<(), AdapterError>;

    /// Removes the entry stored under the key.
    fn release(&self, prefix: &str, key: &str) -> Result<(), AdapterError>;

    /// Removes every entry stored under `prefix`.
    fn release_prefix(&self, prefix: &str) -> Result<(), AdapterError>;

    /// Removes every entry whose key starts with `key_prefix`, whatever its prefix.
    fn release_if_starts_with(&self, key_prefix: &str) -> Result<(), AdapterError>;
}
