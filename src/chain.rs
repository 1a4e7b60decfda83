//! Chain controller.
//!
//! A chain is an index-addressed slice of handlers and one cursor. `next`
//! advances the cursor and runs handlers until the cursor leaves the slice.
//! A middleware that calls `next` therefore runs *every* remaining handler
//! before `next` returns to it, which is what lets it do work both before and
//! after the rest of the chain:
//!
//! ```text
//! ctx.next()                 cursor 0 → logger
//!   logger: start timer
//!   logger: ctx.next()       cursor 1 → recovery
//!     recovery: ctx.next()   cursor 2 → business handler
//!       handler: ctx.json(…)
//!     ← cursor 3 = len, loop ends
//!   logger: log status + elapsed
//! ← outer loop sees cursor ≥ len, returns
//! ```
//!
//! The cursor only moves forward. `fail` and `abort` jump it to the end of the
//! slice, so every `next` loop on the stack exits as soon as control returns
//! to it.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use http::StatusCode;
use tracing::{debug, warn};

use crate::context::Context;
use crate::error::Fault;
use crate::handler::BoxedHandler;

/// Where a context's cursor sits relative to its chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainState {
    NotStarted,
    Running,
    Completed,
}

impl Context {
    /// Run the remaining handlers, in order, on the calling thread.
    ///
    /// Calling it on a completed chain does nothing.
    pub fn next(&mut self) {
        self.index += 1;
        while let Some(handler) = self.current() {
            handler.call(self);
            self.index += 1;
        }
    }

    /// [`next`](Self::next), with any panic below converted into a [`Fault`].
    ///
    /// The fault carries the panic location and a call-stack snapshot taken
    /// before unwinding, so the panicking handler's frames are in it. The
    /// context stays usable afterwards, so the caller can still respond.
    pub fn try_next(&mut self) -> Result<(), Fault> {
        install_panic_hook();

        CATCHING.with(|depth| depth.set(depth.get() + 1));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.next()));
        CATCHING.with(|depth| depth.set(depth.get() - 1));

        outcome.map_err(|payload| {
            let message = panic_message(&*payload);
            match PANIC_SITE.with(|site| site.borrow_mut().take()) {
                Some(site) => Fault::new(message, site.location, site.trace),
                // Someone replaced the hook; the catch site is the best we have.
                None => Fault::new(message, None, Backtrace::force_capture()),
            }
        })
    }

    /// End the chain because something went wrong.
    ///
    /// Skips every remaining handler and writes `{"message": message}` with
    /// `code`.
    pub fn fail(&mut self, code: StatusCode, message: impl Into<String>) {
        let message = message.into();
        warn!(status = code.as_u16(), path = %self.path(), %message, "request failed");
        self.halt(code, &message);
    }

    /// End the chain with a deliberate, non-error response.
    ///
    /// Same effect on the wire as [`fail`](Self::fail); used for short-circuits
    /// such as CORS preflights and rate-limit rejections.
    pub fn abort(&mut self, code: StatusCode, message: impl Into<String>) {
        let message = message.into();
        debug!(status = code.as_u16(), path = %self.path(), %message, "chain aborted");
        self.halt(code, &message);
    }

    /// Jump the cursor to the end and replace whatever was written so far
    /// with the message. Headers other than `Content-Type` are kept.
    fn halt(&mut self, code: StatusCode, message: &str) {
        self.index = self.index.max(self.chain.len() as isize);
        self.writer.reset();
        self.writer.write_message(code, message);
    }

    pub fn state(&self) -> ChainState {
        match self.index {
            i if i < 0 => ChainState::NotStarted,
            i if (i as usize) < self.chain.len() => ChainState::Running,
            _ => ChainState::Completed,
        }
    }

    /// Whether `fail`/`abort` ended the chain or every handler has run.
    pub fn is_completed(&self) -> bool {
        self.state() == ChainState::Completed
    }

    fn current(&self) -> Option<BoxedHandler> {
        usize::try_from(self.index).ok().and_then(|i| self.chain.get(i))
    }
}

// ── Panic site capture ────────────────────────────────────────────────────────

struct PanicSite {
    location: Option<String>,
    trace: Backtrace,
}

thread_local! {
    /// Number of `try_next` frames active on this thread.
    static CATCHING: Cell<u32> = const { Cell::new(0) };
    static PANIC_SITE: RefCell<Option<PanicSite>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Chain a hook in front of the existing one that records where a panic
/// happened, but only on threads currently inside `try_next`.
fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if CATCHING.with(Cell::get) > 0 {
                let site = PanicSite {
                    location: info.location().map(ToString::to_string),
                    trace: Backtrace::force_capture(),
                };
                PANIC_SITE.with(|slot| *slot.borrow_mut() = Some(site));
            }
            previous(info);
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Chain;
    use crate::request::Params;
    use std::sync::{Arc, Mutex};

    type Trace = Arc<Mutex<Vec<String>>>;

    fn ctx(chain: Chain) -> Context {
        Context::new(http::Request::get("/").body(()).unwrap(), Params::new(), chain)
    }

    fn record(trace: &Trace, label: &'static str) -> impl Fn(&mut Context) + Send + Sync + 'static {
        let trace = Arc::clone(trace);
        move |_: &mut Context| trace.lock().unwrap().push(label.to_owned())
    }

    fn wrap(trace: &Trace, label: &'static str) -> impl Fn(&mut Context) + Send + Sync + 'static {
        let trace = Arc::clone(trace);
        move |c: &mut Context| {
            trace.lock().unwrap().push(format!("{label}:before"));
            c.next();
            trace.lock().unwrap().push(format!("{label}:after"));
        }
    }

    #[test]
    fn runs_every_handler_once_in_order() {
        let trace = Trace::default();
        let chain = (0..5).fold(Chain::new(), |chain, i| {
            let trace = Arc::clone(&trace);
            chain.then(move |_: &mut Context| trace.lock().unwrap().push(i.to_string()))
        });
        let mut c = ctx(chain);

        assert_eq!(c.state(), ChainState::NotStarted);
        c.next();
        assert_eq!(c.state(), ChainState::Completed);
        assert_eq!(*trace.lock().unwrap(), ["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn nested_next_runs_downstream_before_returning() {
        let trace = Trace::default();
        let chain = Chain::new()
            .then(wrap(&trace, "outer"))
            .then(wrap(&trace, "inner"))
            .then(record(&trace, "handler"));
        ctx(chain).next();

        assert_eq!(
            *trace.lock().unwrap(),
            ["outer:before", "inner:before", "handler", "inner:after", "outer:after"]
        );
    }

    #[test]
    fn fail_skips_the_rest_and_writes_message() {
        let trace = Trace::default();
        let chain = Chain::new()
            .then(record(&trace, "first"))
            .then(|c: &mut Context| c.fail(StatusCode::UNAUTHORIZED, "no token"))
            .then(record(&trace, "never"));
        let mut c = ctx(chain);
        c.next();

        assert_eq!(*trace.lock().unwrap(), ["first"]);
        assert_eq!(c.status_code(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = serde_json::from_slice(c.response().body()).unwrap();
        assert_eq!(body, serde_json::json!({ "message": "no token" }));
        assert!(c.is_completed());
    }

    #[test]
    fn fail_inside_nested_next_unwinds_outer_loops() {
        let trace = Trace::default();
        let chain = Chain::new()
            .then(wrap(&trace, "mw"))
            .then(|c: &mut Context| c.abort(StatusCode::NO_CONTENT, "stop"))
            .then(record(&trace, "never"));
        ctx(chain).next();

        assert_eq!(*trace.lock().unwrap(), ["mw:before", "mw:after"]);
    }

    #[test]
    fn next_after_completion_is_a_no_op() {
        let trace = Trace::default();
        let mut c = ctx(Chain::new().then(record(&trace, "once")));
        c.next();
        c.next();
        c.next();
        assert_eq!(*trace.lock().unwrap(), ["once"]);
        assert_eq!(c.state(), ChainState::Completed);
    }

    #[test]
    fn empty_chain_completes_immediately() {
        let mut c = ctx(Chain::new());
        c.next();
        assert!(c.is_completed());
        assert!(!c.response().written());
    }

    fn explode(_: &mut Context) {
        panic!("handler exploded");
    }

    fn explode_formatted(_: &mut Context) {
        panic!("code {}", 7);
    }

    #[test]
    fn try_next_turns_panics_into_faults() {
        let trace = Trace::default();
        let chain = Chain::new()
            .then(explode)
            .then(record(&trace, "never"));
        let mut c = ctx(chain);

        let fault = c.try_next().unwrap_err();
        assert_eq!(fault.message(), "handler exploded");
        assert!(!fault.trace().is_empty());
        assert!(fault.location().is_some_and(|l| l.contains("chain.rs")));
        assert_eq!(c.state(), ChainState::Running);

        c.fail(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        assert!(c.is_completed());
        assert!(trace.lock().unwrap().is_empty());
    }

    #[test]
    fn nested_catch_sites_each_get_their_own_fault() {
        let inner = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&inner);
        let chain = Chain::new()
            .then(move |c: &mut Context| {
                let fault = c.try_next().unwrap_err();
                *slot.lock().unwrap() = Some(fault.message().to_owned());
            })
            .then(explode);
        let mut c = ctx(chain);

        assert!(c.try_next().is_ok());
        assert_eq!(inner.lock().unwrap().as_deref(), Some("handler exploded"));
    }

    #[test]
    fn fail_replaces_what_downstream_wrote() {
        let chain = Chain::new()
            .then(|c: &mut Context| {
                c.set_header("x-request-id", "abc");
                c.next();
                c.fail(StatusCode::FORBIDDEN, "denied");
            })
            .then(|c: &mut Context| c.string(StatusCode::OK, "secret"));
        let mut c = ctx(chain);
        c.next();

        assert_eq!(c.status_code(), StatusCode::FORBIDDEN);
        let body: serde_json::Value = serde_json::from_slice(c.response().body()).unwrap();
        assert_eq!(body, serde_json::json!({ "message": "denied" }));
        assert_eq!(c.response().headers()["content-type"], "application/json");
        assert_eq!(c.response().headers()["x-request-id"], "abc");
    }

    #[test]
    fn cursor_never_moves_backwards() {
        let mut c = ctx(Chain::new().then(|_: &mut Context| {}));
        c.next();
        c.next();
        let index = c.index;
        assert!(index > 1);

        c.abort(StatusCode::NO_CONTENT, "late");
        assert_eq!(c.index, index);
        assert!(c.is_completed());
    }

    #[test]
    fn formatted_panic_payload_is_kept() {
        let mut c = ctx(Chain::new().then(explode_formatted));
        assert_eq!(c.try_next().unwrap_err().message(), "code 7");
    }
}
