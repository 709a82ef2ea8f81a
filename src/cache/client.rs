//! The caching middleware.
//!
//! For each eligible request the client walks a small state machine:
//!
//! ```text
//! CHECK_REFRESH ─┬─ trigger present ─▶ FORCED_RELEASE ───────────────┐
//!                └─ otherwise ───────▶ LOOKUP ─┬─ fresh ─▶ HIT       │
//!                                              ├─ stale ─▶ release ──┤
//!                                              └─ absent ────────────┴─▶ MISS
//! ```
//!
//! A hit is answered from the adapter without calling the wrapped handler. A
//! miss calls the handler, stores the result when its status is below 400 and
//! returns it. Concurrent misses for the same key both reach the handler and
//! the last write wins.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::context::Context;
use crate::http::Response;
use crate::middleware::{Middleware, Next};

use super::envelope::render;
use super::{Adapter, AdapterError, CacheKey, ClientBuilder, Clock, Envelope};

/// Errors returned by the explicit invalidation operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cannot derive a cache key from {uri:?}")]
    InvalidUri { uri: String },

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

/// HTTP response cache, usable as a [`Middleware`].
///
/// Cloning is cheap; every clone shares the same configuration and adapter.
///
/// # Examples
///
/// ```rust,no_run
/// use std::{sync::Arc, time::Duration};
/// use rttp_cache::{
///     Response, StatusCode,
///     cache::{Adapter, Client},
///     context::Context,
///     middleware::{Next, from_handler, from_middleware},
///     http::{Method, Request},
/// };
///
/// # async fn example(adapter: Arc<dyn Adapter>) -> Result<(), Box<dyn std::error::Error>> {
/// let cache = Client::builder()
///     .adapter(adapter)
///     .ttl(Duration::from_secs(60))
///     .refresh_key("refresh")
///     .build()?;
///
/// let stack = vec![
///     from_middleware(Arc::new(cache.clone())),
///     from_handler(|_ctx: Context| async { Response::new(StatusCode::Ok).body("items") }),
/// ];
/// let request = Request::new(Method::Get, "/items?page=1");
/// let response = Next::new(stack).run(Context::new(request)).await;
///
/// // After a write, drop every cached page of the listing.
/// cache.release_prefix("/items")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    adapter: Arc<dyn Adapter>,
    ttl: Duration,
    refresh_key: Option<String>,
    debug: bool,
    clock: Arc<dyn Clock>,
}

impl Client {
    /// Starts building a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(super) fn from_parts(
        adapter: Arc<dyn Adapter>,
        ttl: Duration,
        refresh_key: Option<String>,
        debug: bool,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                adapter,
                ttl,
                refresh_key,
                debug,
                clock,
            }),
        }
    }

    /// How long a stored response stays fresh.
    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// The query parameter that forces a refresh, if configured.
    pub fn refresh_key(&self) -> Option<&str> {
        self.inner.refresh_key.as_deref()
    }

    /// Whether per-request lifecycle logging is on.
    pub fn debug_enabled(&self) -> bool {
        self.inner.debug
    }

    /// Runs one request through the cache, calling `next` when it cannot be
    /// answered from storage.
    pub async fn serve(&self, mut ctx: Context, next: Next) -> Response {
        if !ctx.request().method().is_get_like() {
            return next.run(ctx).await;
        }

        let forced = match self.refresh_key() {
            Some(name) => strip_param(&mut ctx, name),
            None => false,
        };
        let key = CacheKey::from_request(ctx.request());

        if forced {
            if self.inner.debug {
                debug!(cache_key = %key, "refresh key found, releasing");
            }
            self.release_quietly(&key);
        } else if let Some(response) = self.lookup(&key) {
            return response;
        }

        self.fill(ctx, next, key).await
    }

    /// Removes the entry for one URI, given as `/path?query` or as an absolute URI.
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidUri`] if no key can be derived, or the adapter's error.
    pub fn release_uri(&self, uri: &str) -> Result<(), CacheError> {
        let key = CacheKey::from_uri(uri)?;
        self.inner.adapter.release(key.prefix(), key.key())?;
        Ok(())
    }

    /// Removes every entry cached under `prefix`, i.e. all variants of one path.
    pub fn release_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        self.inner.adapter.release_prefix(prefix)?;
        Ok(())
    }

    /// Removes every entry whose hashed key starts with `key_prefix`.
    pub fn release_if_starts_with(&self, key_prefix: &str) -> Result<(), CacheError> {
        self.inner.adapter.release_if_starts_with(key_prefix)?;
        Ok(())
    }

    // LOOKUP: `Some` only for a fresh hit. Stale and unreadable entries are
    // released so the miss path can replace them.
    fn lookup(&self, key: &CacheKey) -> Option<Response> {
        let stored = match self.inner.adapter.get(key.prefix(), key.key()) {
            Ok(Some(stored)) => stored,
            Ok(None) => return None,
            Err(e) => {
                warn!(cache_key = %key, error = %e, "cache lookup failed, treating as miss");
                return None;
            }
        };

        let mut envelope = match Envelope::decode(&stored) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(cache_key = %key, error = %e, "discarding undecodable cache entry");
                self.release_quietly(key);
                return None;
            }
        };

        let now = self.inner.clock.now();
        if !envelope.is_fresh_at(now) {
            if self.inner.debug {
                debug!(cache_key = %key, "cached entry expired, releasing");
            }
            self.release_quietly(key);
            return None;
        }

        envelope.touch(now);
        if self.inner.debug {
            debug!(cache_key = %key, frequency = envelope.frequency, "serving from cache");
        }
        self.store(key, &envelope);
        Some(envelope.to_response())
    }

    // MISS: run the wrapped handler and keep anything that is not an error.
    async fn fill(&self, ctx: Context, next: Next, key: CacheKey) -> Response {
        if self.inner.debug {
            debug!(cache_key = %key, "not cached, calling handler");
        }

        let (status, headers, body) = next.run(ctx).await.into_parts();

        if status.is_error() {
            if self.inner.debug {
                debug!(cache_key = %key, status = status.as_u16(), "error response not cached");
            }
            return render(status, &headers.grouped(), body);
        }

        let now = self.inner.clock.now();
        let Some(expiration) = now.checked_add(self.inner.ttl) else {
            warn!(cache_key = %key, ttl = ?self.inner.ttl, "expiration out of range, response not cached");
            return render(status, &headers.grouped(), body);
        };

        let envelope = Envelope::new(body, &headers, now, expiration);
        self.store(&key, &envelope);
        render(status, &envelope.headers, envelope.value)
    }

    fn store(&self, key: &CacheKey, envelope: &Envelope) {
        let bytes = match envelope.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(cache_key = %key, error = %e, "cache entry not encodable, skipping store");
                return;
            }
        };
        if let Err(e) = self.inner.adapter.set(key.prefix(), key.key(), bytes) {
            warn!(cache_key = %key, error = %e, "failed to store cache entry");
        }
    }

    fn release_quietly(&self, key: &CacheKey) {
        if let Err(e) = self.inner.adapter.release(key.prefix(), key.key()) {
            warn!(cache_key = %key, error = %e, "failed to release cache entry");
        }
    }
}

impl Middleware for Client {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let client = self.clone();
        Box::pin(async move { client.serve(ctx, next).await })
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("ttl", &self.inner.ttl)
            .field("refresh_key", &self.inner.refresh_key)
            .field("debug", &self.inner.debug)
            .finish_non_exhaustive()
    }
}

// Drops the refresh parameter from the request so the handler and the key
// both see the URL without it. Returns whether it was present.
fn strip_param(ctx: &mut Context, name: &str) -> bool {
    if !ctx.request().query_params().contains(name) {
        return false;
    }
    let mut params = ctx.request().query_params().clone();
    params.remove(name);
    ctx.request_mut().set_query_params(params);
    true
}
