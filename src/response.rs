//! The response half of a [`Context`](crate::Context).
//!
//! Handlers never build a response value and return it. They write into the
//! context's [`ResponseWriter`], which the server turns into one
//! `http::Response` once the chain has finished.

use std::io;

use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use tracing::{debug, warn};

// ── ContentType ───────────────────────────────────────────────────────────────

pub(crate) const JSON: &str = "application/json";
pub(crate) const HTML: &str = "text/html; charset=utf-8";
pub(crate) const TEXT: &str = "text/plain; charset=utf-8";
pub(crate) const OCTET_STREAM: &str = "application/octet-stream";

// ── ResponseWriter ────────────────────────────────────────────────────────────

/// Response headers, status, and body for one request.
///
/// # Status policy
///
/// The first status written is the one sent. Headers are committed together
/// with it, so:
///
/// - a second [`write_header`](Self::write_header) is ignored (logged at `warn`);
/// - header changes after the commit are ignored (logged at `debug`);
/// - writing body bytes before any status commits `200 OK`.
#[derive(Debug, Default)]
pub struct ResponseWriter {
    headers: HeaderMap,
    status: Option<StatusCode>,
    body: BytesMut,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit the status line and headers. Later calls are no-ops.
    pub fn write_header(&mut self, code: StatusCode) {
        match self.status {
            None => self.status = Some(code),
            Some(sent) if sent != code => {
                warn!(sent = sent.as_u16(), ignored = code.as_u16(), "superfluous status write");
            }
            Some(_) => {}
        }
    }

    /// Replace a header. Invalid names or values are dropped with a warning.
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let Some((name, value)) = self.header_pair(name, value) {
            self.headers.insert(name, value);
        }
    }

    /// Add a header without removing existing values of the same name.
    pub fn append_header(&mut self, name: &str, value: &str) {
        if let Some((name, value)) = self.header_pair(name, value) {
            self.headers.append(name, value);
        }
    }

    fn header_pair(&self, name: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
        if self.written() {
            debug!(header = name, "header set after status was written; ignored");
            return None;
        }
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => Some((name, value)),
            _ => {
                warn!(header = name, "invalid header name or value; ignored");
                None
            }
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub(crate) fn has_content_type(&self) -> bool {
        self.headers.contains_key(CONTENT_TYPE)
    }

    /// Whether a status has been committed.
    pub fn written(&self) -> bool {
        self.status.is_some()
    }

    /// The committed status, or `200 OK` if nothing has been written yet.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Append body bytes, committing `200 OK` first if needed.
    pub fn write_body(&mut self, bytes: &[u8]) {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(bytes);
    }

    /// Discard the status, body, and `Content-Type` written so far.
    ///
    /// Other headers (CORS, `Set-Cookie`) survive. Nothing has reached the
    /// client before the chain ends, so this is always safe.
    pub(crate) fn reset(&mut self) {
        self.status = None;
        self.body.clear();
        self.headers.remove(CONTENT_TYPE);
    }

    /// Write `{"message": ...}` with the given status.
    pub(crate) fn write_message(&mut self, code: StatusCode, message: &str) {
        self.set_header(CONTENT_TYPE.as_str(), JSON);
        self.write_header(code);
        let body = serde_json::json!({ "message": message });
        self.write_body(body.to_string().as_bytes());
    }

    /// A standalone `{"message": ...}` response.
    pub fn message(code: StatusCode, message: &str) -> http::Response<Full<Bytes>> {
        let mut writer = Self::new();
        writer.write_message(code, message);
        writer.into_http()
    }

    /// Convert into the transport representation.
    ///
    /// Statuses that forbid a body (1xx, 204, 304) are sent without one.
    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        let status = self.status();
        let body = if status.is_informational()
            || status == StatusCode::NO_CONTENT
            || status == StatusCode::NOT_MODIFIED
        {
            Bytes::new()
        } else {
            self.body.freeze()
        };

        let mut response = http::Response::new(Full::new(body));
        *response.status_mut() = status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_body(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
