//! Error types.
//!
//! Application-level outcomes (a 404, a rejected preflight, a rate-limited
//! request) are written to the [`Context`](crate::Context) as responses, not
//! returned as errors. The types here surface the things a handler has to
//! decide about: a body that would not bind, a missing cookie, a store value
//! of the wrong type, or a downstream panic caught by the chain.

use std::backtrace::Backtrace;
use std::fmt;

/// Infrastructure failure: binding to a port or accepting a connection.
#[derive(Debug, thiserror::Error)]
#[error("io: {0}")]
pub struct Error(#[from] std::io::Error);

/// Failure to decode a request body into a typed value.
///
/// Returned to the calling handler as-is. The binder never turns these into
/// HTTP responses; what the client is told is the handler's call.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("unsupported content type `{0}`")]
    UnsupportedMediaType(String),

    #[error("{0} requests carry no body")]
    InvalidRequest(http::Method),

    #[error("missing or malformed content-length `{0}`")]
    MalformedLength(String),

    #[error("body truncated: expected {expected} bytes, read {actual}")]
    TruncatedBody { expected: u64, actual: u64 },

    #[error("decode: {0}")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    #[error("cookie `{0}` not present")]
    NotFound(String),
}

/// Strict store lookup failure. The soft accessors (`get_string`, ...) never
/// produce this; they fall back to the type's zero value.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("key `{0}` not present")]
    Missing(String),

    #[error("key `{key}` does not hold a `{expected}`")]
    TypeMismatch { key: String, expected: &'static str },
}

/// A panic raised by a handler somewhere down the chain.
///
/// Carries the panic payload (when it was a string), the source location of
/// the `panic!`, and a call-stack snapshot taken while the panicking handler
/// was still on the stack.
pub struct Fault {
    message: String,
    location: Option<String>,
    trace: Backtrace,
}

impl Fault {
    pub(crate) fn new(message: String, location: Option<String>, trace: Backtrace) -> Self {
        Self { message, location, trace }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// `file:line:column` of the panic, when it was recorded.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Rendered call-stack snapshot.
    pub fn trace(&self) -> String {
        self.trace.to_string()
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fault")
            .field("message", &self.message)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "downstream fault: {}", self.message)
    }
}

impl std::error::Error for Fault {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_messages_name_the_problem() {
        let err = BindError::TruncatedBody { expected: 13, actual: 4 };
        assert_eq!(err.to_string(), "body truncated: expected 13 bytes, read 4");

        let err = BindError::InvalidRequest(http::Method::GET);
        assert_eq!(err.to_string(), "GET requests carry no body");
    }

    #[test]
    fn fault_display_hides_trace() {
        let fault = Fault::new("boom".into(), None, Backtrace::force_capture());
        assert_eq!(fault.to_string(), "downstream fault: boom");
        assert_eq!(fault.message(), "boom");
    }
}
