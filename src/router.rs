//! Radix-tree request router with a middleware chain.
//!
//! One tree per HTTP method. O(path-length) lookup. Middleware wraps the
//! whole router, not individual routes, so a layer also observes requests
//! that end in 404.

use std::collections::HashMap;
use std::future;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// The application router.
///
/// Build it once at startup and pass it to [`Server::serve`](crate::Server::serve).
///
/// ```rust,no_run
/// # use tsu_logging::{AccessLog, Request, Response, Router};
/// # async fn get_user(_: Request) -> Response { Response::text("") }
/// # async fn create_user(_: Request) -> Response { Response::text("") }
/// Router::new()
///     .layer(AccessLog::new())
///     .get("/users/{id}", get_user)
///     .post("/users", create_user);
/// ```
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    layers: Vec<Arc<dyn Middleware>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics if the path is not a valid route or conflicts with an existing one.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Appends a middleware. The first registered runs outermost.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        self.layers.push(Arc::new(middleware));
        self
    }

    /// Runs a request through the middleware chain and the matched route.
    pub fn call(self: Arc<Self>, req: Request) -> BoxFuture {
        Next::new(self).run(req)
    }

    pub(crate) fn layer_at(&self, index: usize) -> Option<Arc<dyn Middleware>> {
        self.layers.get(index).cloned()
    }

    /// Innermost step of the chain: lookup and dispatch, or 404.
    pub(crate) fn route(&self, mut req: Request) -> BoxFuture {
        let Some((handler, params)) = self.lookup(req.method(), req.path()) else {
            return Box::pin(future::ready(Response::status(StatusCode::NOT_FOUND)));
        };
        req.set_params(params);
        handler.call(req)
    }

    fn lookup(&self, method: &Method, path: &str) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }
}
