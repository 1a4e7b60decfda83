use http::StatusCode;
use tracing::error;

use crate::context::Context;
use crate::handler::Handler;

/// Catch panics raised further down the chain.
///
/// The panic is logged together with its location and a call-stack snapshot,
/// and the client gets `500 {"message": "Internal Server Error"}`, replacing
/// any status or body the handler wrote before panicking. Nothing downstream
/// of the panicking handler runs.
///
/// Requires the default `panic = "unwind"` strategy.
pub fn recovery() -> impl Handler {
    |c: &mut Context| {
        if let Err(fault) = c.try_next() {
            error!(
                path = %c.path(),
                panic = fault.message(),
                location = fault.location().unwrap_or("unknown"),
                "recovered from downstream fault\nTraceback:\n{}",
                fault.trace()
            );
            c.fail(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    }
}
