//! Cache key derivation.
//!
//! Every cached response is addressed by a [`CacheKey`]: the request path as the
//! grouping `prefix`, plus a `key` hashed from the canonical form of the full
//! URL. Canonicalization sorts the values of each query parameter and re-encodes
//! the query with names in ascending order, so parameter order never affects the
//! key.
//!
//! The hash is 64-bit FNV-1a rendered in decimal. Collisions between distinct
//! URLs are possible in principle and are not detected.

use std::fmt;

use crate::http::{QueryParams, Request};

use super::client::CacheError;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// The `(prefix, key)` pair under which a response is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    prefix: String,
    key: String,
}

impl CacheKey {
    /// Derives the key for a request from its path and query string.
    ///
    /// # Examples
    ///
    /// ```
    /// use rttp_cache::cache::CacheKey;
    /// use rttp_cache::http::{Method, Request};
    ///
    /// let a = CacheKey::from_request(&Request::new(Method::Get, "/items?b=2&a=1"));
    /// let b = CacheKey::from_request(&Request::new(Method::Get, "/items?a=1&b=2"));
    /// assert_eq!(a, b);
    /// assert_eq!(a.prefix(), "/items");
    /// ```
    pub fn from_request(request: &Request) -> Self {
        Self::derive(request.path(), request.query_params().clone())
    }

    /// Derives the key for a URI given either as an origin-form target
    /// (`/items?a=1`) or as an absolute URI (`https://host/items?a=1`).
    ///
    /// Only the path and query of an absolute URI take part, so both forms of
    /// the same resource map to the key the middleware uses for it.
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidUri`] if `uri` is neither form.
    pub fn from_uri(uri: &str) -> Result<Self, CacheError> {
        if uri.starts_with('/') {
            let target = uri.split_once('#').map_or(uri, |(before, _)| before);
            let (path, query) = target.split_once('?').unwrap_or((target, ""));
            return Ok(Self::derive(path, QueryParams::parse(query)));
        }

        let parsed = url::Url::parse(uri).map_err(|_| CacheError::InvalidUri {
            uri: uri.to_owned(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(CacheError::InvalidUri {
                uri: uri.to_owned(),
            });
        }
        let query = parsed.query().unwrap_or("");
        Ok(Self::derive(parsed.path(), QueryParams::parse(query)))
    }

    fn derive(path: &str, mut params: QueryParams) -> Self {
        params.sort_values();
        let canonical = canonical_url(path, &params);
        Self {
            prefix: path.to_owned(),
            key: fnv1a_64(canonical.as_bytes()).to_string(),
        }
    }

    /// The request path, shared by every cached variant of a route.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The hashed canonical URL, unique per path and query.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.prefix, self.key)
    }
}

/// `path?query` with the query re-encoded from `params`, or just `path` when
/// there is nothing to encode.
pub fn canonical_url(path: &str, params: &QueryParams) -> String {
    let query = params.encode();
    if query.is_empty() {
        path.to_owned()
    } else {
        format!("{path}?{query}")
    }
}

/// 64-bit FNV-1a.
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}
