//! # weft
//!
//! The request-processing core of a small web framework: a per-request
//! [`Context`], an ordered handler chain you step through with
//! [`Context::next`], a shared key-value [`Store`], a JSON/XML body binder,
//! and the four middlewares most services start with.
//!
//! ## What's in the box
//!
//! - **Context**: request accessors (params, query, form, headers, cookies)
//!   and response writers (`string`, `json`, `data`, `html`, `set_cookie`).
//! - **Chain control**: `next`, `fail`, `abort`, and `try_next` for catching
//!   panics below a middleware.
//! - **Store**: thread-safe `key → any` map with soft-typed getters that
//!   return zero values instead of errors.
//! - **Binder**: `should_bind` reads exactly `Content-Length` bytes and
//!   decodes JSON or XML by `Content-Type`.
//! - **Middleware**: [`logger`](middleware::logger),
//!   [`recovery`](middleware::recovery), [`cors`](middleware::cors),
//!   [`rate_limit`](middleware::rate_limit).
//!
//! Routing ([`Router`], over [`matchit`]) and serving ([`Server`], over hyper)
//! are thin: just enough to put a chain on the wire.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use http::StatusCode;
//! use serde::Deserialize;
//! use weft::{Context, Router, Server, middleware};
//!
//! #[derive(Deserialize)]
//! struct NewUser {
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .use_middleware(middleware::logger())
//!         .use_middleware(middleware::recovery())
//!         .use_middleware(middleware::rate_limit(Duration::from_millis(10), 100))
//!         .get("/users/{id}", get_user)
//!         .post("/users", create_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! fn get_user(c: &mut Context) {
//!     let id = c.param("id").to_owned();
//!     c.json(StatusCode::OK, &serde_json::json!({ "id": id }));
//! }
//!
//! fn create_user(c: &mut Context) {
//!     let user: NewUser = match c.should_bind() {
//!         Ok(user) => user,
//!         Err(e) => return c.fail(StatusCode::BAD_REQUEST, e.to_string()),
//!     };
//!     c.set_header("location", "/users/99");
//!     c.json(StatusCode::CREATED, &serde_json::json!({ "name": user.name }));
//! }
//! ```
//!
//! Handlers are plain synchronous functions. The server runs each chain on a
//! blocking worker, so a handler may do blocking I/O without stalling other
//! connections.

mod binding;
mod chain;
mod context;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;
mod store;
mod template;

pub mod middleware;

pub use chain::ChainState;
pub use context::Context;
pub use error::{BindError, CookieError, Error, Fault, StoreError};
pub use handler::{Chain, Handler};
pub use request::{Params, Request};
pub use response::ResponseWriter;
pub use router::Router;
pub use server::Server;
pub use store::{Store, Value};
pub use template::{TemplateEngine, TemplateError};
