//! Per-request context carried through the middleware pipeline.

use crate::Request;

/// Per-request context handed to each [`Middleware`](crate::middleware::Middleware).
///
/// A middleware may rewrite the request in place through
/// [`request_mut`](Self::request_mut) before forwarding the context to the next
/// layer; downstream layers and the final handler observe the rewritten request.
#[derive(Debug)]
pub struct Context {
    request: Request,
}

impl Context {
    /// Create a new context from a request
    pub fn new(request: Request) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    /// Consume the context, returning the request
    pub fn into_request(self) -> Request {
        self.request
    }
}

impl From<Request> for Context {
    fn from(request: Request) -> Self {
        Self::new(request)
    }
}
