//! Radix-tree route table.
//!
//! Path matching is not this crate's concern; it sits here so the server has
//! something to hand it `(chain, params)` for each request. One tree per HTTP
//! method, O(path-length) lookup. Global middleware is prepended to every
//! route's chain at lookup time, and also runs for requests no route matches,
//! ahead of the `404`. That is what lets [`cors`](crate::middleware::cors)
//! answer preflights for paths that only register `GET` or `POST`.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::context::Context;
use crate::handler::{Chain, Handler};
use crate::request::{Params, Request};
use crate::template::TemplateEngine;

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Every builder method returns `self` so registrations chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Chain>>,
    middleware: Chain,
    templates: Option<Arc<dyn TemplateEngine>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), middleware: Chain::new(), templates: None }
    }

    /// Register a handler chain for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; `c.param("name")` retrieves them:
    ///
    /// ```rust
    /// # use weft::{Chain, Context, Router};
    /// # fn get_user(_: &mut Context) {}
    /// # fn create_user(_: &mut Context) {}
    /// # fn audit(c: &mut Context) { c.next() }
    /// Router::new()
    ///     .on(http::Method::GET,  "/users/{id}", Chain::new().then(get_user))
    ///     .on(http::Method::POST, "/users",      Chain::new().then(audit).then(create_user));
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered for `method`.
    pub fn on(mut self, method: Method, path: &str, chain: Chain) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, chain)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, Chain::new().then(handler))
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, Chain::new().then(handler))
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, Chain::new().then(handler))
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, Chain::new().then(handler))
    }

    /// Run `handler` ahead of every route, in registration order.
    pub fn use_middleware(mut self, handler: impl Handler) -> Self {
        self.middleware = self.middleware.then(handler);
        self
    }

    /// Engine used by [`Context::html`].
    pub fn templates(mut self, engine: impl TemplateEngine + 'static) -> Self {
        self.templates = Some(Arc::new(engine));
        self
    }

    fn lookup(&self, method: &Method, path: &str) -> Option<(Chain, Params)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let params = matched.params.iter().collect();
        Some((self.middleware.join(matched.value), params))
    }

    /// Resolve `request` into a ready-to-run context.
    ///
    /// Unmatched requests get the global middleware followed by a handler
    /// answering `404 {"message": "not found"}`.
    pub fn context(&self, request: impl Into<Request>) -> Context {
        let request = request.into();
        let (chain, params) = self
            .lookup(request.method(), request.path())
            .unwrap_or_else(|| (self.middleware.clone().then(not_found), Params::new()));

        let ctx = Context::new(request, params, chain);
        match &self.templates {
            Some(engine) => ctx.with_templates(Arc::clone(engine)),
            None => ctx,
        }
    }
}

fn not_found(c: &mut Context) {
    c.abort(StatusCode::NOT_FOUND, "not found");
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
