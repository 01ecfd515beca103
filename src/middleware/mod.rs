//! Middleware layer.
//!
//! Middleware intercepts requests and responses: the place for cross-cutting
//! concerns such as access logging, request-id injection and header checks.
//!
//! A middleware receives the request and a [`Next`] continuation, and must
//! return a response, usually by awaiting `next.run(req)`:
//!
//! ```rust
//! use tsu_logging::{Request, Response, Router};
//! use tsu_logging::middleware::Next;
//!
//! async fn deny_empty_body(req: Request, next: Next) -> Response {
//!     if req.method() == http::Method::POST && req.body().is_empty() {
//!         return Response::status(http::StatusCode::BAD_REQUEST);
//!     }
//!     next.run(req).await
//! }
//!
//! let app = Router::new().layer(deny_empty_body);
//! ```
//!
//! Layers run in registration order: the first registered is the outermost
//! and sees every request, including those no route matches.

use std::future::Future;
use std::sync::Arc;

use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

pub mod access_log;

pub use access_log::AccessLog;

/// A request interceptor. Implemented for every
/// `async fn(Request, Next) -> Response`.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, req: Request, next: Next) -> BoxFuture;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        Box::pin(self(req, next))
    }
}

/// The rest of the chain: the remaining layers, then the matched route.
pub struct Next {
    router: Arc<Router>,
    index: usize,
}

impl Next {
    pub(crate) fn new(router: Arc<Router>) -> Self {
        Self { router, index: 0 }
    }

    pub fn run(self, req: Request) -> BoxFuture {
        match self.router.layer_at(self.index) {
            Some(layer) => layer.handle(req, Self { router: Arc::clone(&self.router), index: self.index + 1 }),
            None => self.router.route(req),
        }
    }
}
