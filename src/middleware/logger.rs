use std::time::Instant;

use tracing::info;

use crate::context::Context;
use crate::handler::Handler;

/// Log status, request URI, and elapsed time once the rest of the chain has run.
pub fn logger() -> impl Handler {
    |c: &mut Context| {
        let start = Instant::now();
        c.next();
        info!(
            status = c.status_code().as_u16(),
            uri = %c.request_uri(),
            elapsed = ?start.elapsed(),
            "request completed"
        );
    }
}
