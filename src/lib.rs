//! # rttp-cache
//!
//! HTTP response caching middleware for the rttp framework.
//!
//! A [`cache::Client`] wraps a handler: `GET` requests whose response is already
//! stored and still fresh are answered from an external store, everything else
//! reaches the handler and successful results are stored for next time.
//! Storage and eviction are supplied by the embedding application through the
//! [`cache::Adapter`] trait.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::{sync::Arc, time::Duration};
//! use rttp_cache::cache::{Adapter, Client};
//! use rttp_cache::context::Context;
//! use rttp_cache::middleware::{Next, from_handler, from_middleware};
//! use rttp_cache::{Method, Request, Response, StatusCode};
//!
//! # async fn run(store: Arc<dyn Adapter>) -> Result<(), Box<dyn std::error::Error>> {
//! let cache = Client::builder()
//!     .adapter(store)
//!     .ttl(Duration::from_secs(60))
//!     .build()?;
//!
//! let stack = vec![
//!     from_middleware(Arc::new(cache)),
//!     from_handler(|_ctx: Context| async { Response::new(StatusCode::Ok).body("Hello, World!") }),
//! ];
//! let request = Request::new(Method::Get, "/hello");
//! let response = Next::new(stack).run(Context::new(request)).await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod context;
pub mod http;
pub mod middleware;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use http::{Headers, Method, QueryParams, Request, Response, StatusCode};
