//! Response caching middleware.
//!
//! [`Client`] sits in front of a handler and answers repeated `GET` requests
//! from an external store. The pieces, leaf-first:
//!
//! - [`CacheKey`]: `(prefix, key)` derived from the request path and a hash of
//!   the canonical URL.
//! - [`Envelope`]: the stored response with its expiration, last access and
//!   hit count, encoded to bytes with a versioned layout.
//! - [`Adapter`]: the storage port. Backends own eviction and locking.
//! - [`ClientBuilder`] / [`CacheSettings`]: construction-time configuration.
//! - [`Client`]: the request lifecycle and the invalidation operations.
//!
//! Responses with status 400 and above are passed through but never stored,
//! and only `GET` requests are considered at all.

mod adapter;
mod client;
mod clock;
mod config;
mod envelope;
mod keys;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::{Adapter, AdapterError};
pub use client::{CacheError, Client};
pub use clock::{Clock, SystemClock};
pub use config::{CacheSettings, ClientBuilder, ConfigError, MAX_TTL};
pub use envelope::{DecodeError, EncodeError, Envelope, FORMAT_VERSION};
pub use keys::{CacheKey, canonical_url, fnv1a_64};
