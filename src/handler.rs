//! Handler trait, type erasure, and the handler chain.
//!
//! # How handlers are stored
//!
//! A chain mixes handlers of *different* types: a logger closure, a rate
//! limiter that owns a bucket, the user's business function. Rust slices can
//! only hold one concrete type, so every handler is hidden behind a trait
//! object (`dyn ErasedHandler`) and the chain stores them uniformly.
//!
//! ```text
//! fn hello(c: &mut Context) { … }                ← user writes this
//!        ↓ Chain::new().then(hello)
//! hello.into_boxed_handler()                     ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(hello))                     ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(ctx)  when the cursor reaches it  ← one vtable dispatch
//! ```
//!
//! Handlers are synchronous. A chain runs start to finish on the thread that
//! called [`Context::next`]; anything asynchronous a handler starts is its own
//! business.

use std::sync::Arc;

use crate::context::Context;

// ── Internal types ────────────────────────────────────────────────────────────

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, ctx: &mut Context);
}

/// A type-erased handler shared by every request routed through it.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid handler.
///
/// You never implement this yourself. It is satisfied by any function or
/// closure with the signature:
///
/// ```text
/// fn name(c: &mut Context)
/// ```
///
/// Middleware and the final business handler are the same kind of thing: a
/// middleware is a handler that calls [`Context::next`] somewhere in its body.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F> private::Sealed for F where F: Fn(&mut Context) + Send + Sync + 'static {}

impl<F> Handler for F
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F> ErasedHandler for FnHandler<F>
where
    F: Fn(&mut Context) + Send + Sync,
{
    fn call(&self, ctx: &mut Context) {
        (self.0)(ctx)
    }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

/// An ordered, immutable sequence of handlers.
///
/// Cloning is one atomic increment; the handlers themselves are shared.
/// Build it once at startup and hand a clone to every [`Context`].
///
/// ```rust
/// use weft::{Chain, Context, middleware};
///
/// let chain = Chain::new()
///     .then(middleware::recovery())
///     .then(middleware::logger())
///     .then(|c: &mut Context| c.string(http::StatusCode::OK, "hello"));
///
/// assert_eq!(chain.len(), 3);
/// ```
#[derive(Clone)]
pub struct Chain {
    handlers: Arc<[BoxedHandler]>,
}

impl Chain {
    pub fn new() -> Self {
        Self { handlers: Arc::from(Vec::new()) }
    }

    /// Append a handler. Returns `self` for chaining.
    pub fn then(self, handler: impl Handler) -> Self {
        let mut handlers = self.handlers.to_vec();
        handlers.push(handler.into_boxed_handler());
        Self { handlers: handlers.into() }
    }

    /// `self` followed by every handler of `rest`.
    pub fn join(&self, rest: &Chain) -> Self {
        if self.is_empty() {
            return rest.clone();
        }
        let handlers: Vec<_> = self.handlers.iter().chain(rest.handlers.iter()).cloned().collect();
        Self { handlers: handlers.into() }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub(crate) fn get(&self, index: usize) -> Option<BoxedHandler> {
        self.handlers.get(index).map(Arc::clone)
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}
