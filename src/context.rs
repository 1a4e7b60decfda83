//! Per-request execution context.
//!
//! One [`Context`] is created for every inbound request. It owns everything
//! the handlers of that request touch: the request itself, the matched path
//! parameters, the response being written, the handler chain and its cursor,
//! and the metadata [`Store`]. Nothing in it is shared with other requests.
//!
//! Chain control (`next`, `fail`, `abort`) lives in `chain.rs`; body binding
//! in `binding.rs`. This file holds the request readers and response writers.

use std::fmt;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, COOKIE, SET_COOKIE};
use http::{Method, StatusCode};
use serde::Serialize;

use crate::error::CookieError;
use crate::handler::Chain;
use crate::request::{Params, Request, first};
use crate::response::{self, ResponseWriter};
use crate::store::{Store, Value};
use crate::template::TemplateEngine;

/// Upper bound on a form body read when no `Content-Length` is declared.
const MAX_FORM_BYTES: u64 = 10 << 20;

pub struct Context {
    pub(crate) request: Request,
    params: Params,
    pub(crate) writer: ResponseWriter,
    pub(crate) chain: Chain,
    /// Index of the handler currently running; `-1` before the first.
    pub(crate) index: isize,
    store: Store,
    templates: Option<Arc<dyn TemplateEngine>>,
    form: Option<Vec<(String, String)>>,
}

impl Context {
    pub fn new(request: impl Into<Request>, params: Params, chain: Chain) -> Self {
        Self {
            request: request.into(),
            params,
            writer: ResponseWriter::new(),
            chain,
            index: -1,
            store: Store::new(),
            templates: None,
            form: None,
        }
    }

    /// Attach the engine [`html`](Self::html) renders with.
    pub fn with_templates(mut self, engine: Arc<dyn TemplateEngine>) -> Self {
        self.templates = Some(engine);
        self
    }

    // ── Request ───────────────────────────────────────────────────────────────

    pub fn request(&self) -> &Request { &self.request }
    pub fn method(&self) -> &Method { self.request.method() }
    pub fn path(&self) -> &str { self.request.path() }
    pub fn request_uri(&self) -> &str { self.request.request_uri() }

    /// Matched path parameter, or `""`.
    pub fn param(&self, name: &str) -> &str {
        self.params.get(name).unwrap_or("")
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// URL query parameter, or `""`.
    pub fn query(&self, name: &str) -> &str {
        self.request.query(name).unwrap_or("")
    }

    /// URL query parameter, or `default` when the value is empty.
    pub fn default_query<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        match self.query(name) {
            "" => default,
            value => value,
        }
    }

    /// Form value from an urlencoded body, falling back to the query string.
    ///
    /// The body is read on first use and cached; handlers that read the body
    /// some other way see only query values here.
    pub fn post_form(&mut self, name: &str) -> String {
        let body_value = first(self.form_values(), name).map(str::to_owned);
        body_value.unwrap_or_else(|| self.query(name).to_owned())
    }

    /// Like [`post_form`](Self::post_form), but `default` when the value is empty.
    pub fn default_post_form(&mut self, name: &str, default: &str) -> String {
        match self.post_form(name) {
            value if value.is_empty() => default.to_owned(),
            value => value,
        }
    }

    fn form_values(&mut self) -> &[(String, String)] {
        if self.form.is_none() {
            self.form = Some(self.read_form());
        }
        self.form.as_deref().unwrap_or_default()
    }

    fn read_form(&mut self) -> Vec<(String, String)> {
        let carries_form = [Method::POST, Method::PUT, Method::PATCH].contains(self.method())
            && self
                .get_header(CONTENT_TYPE.as_str())
                .parse::<mime::Mime>()
                .is_ok_and(|m| m.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str());
        if !carries_form {
            return Vec::new();
        }

        let limit = self
            .get_header(CONTENT_LENGTH.as_str())
            .parse::<u64>()
            .map_or(MAX_FORM_BYTES, |n| n.min(MAX_FORM_BYTES));

        let mut raw = Vec::new();
        if let Err(e) = self.request.body.by_ref().take(limit).read_to_end(&mut raw) {
            tracing::debug!("form body read failed: {e}");
            return Vec::new();
        }
        serde_urlencoded::from_bytes(&raw).unwrap_or_default()
    }

    /// Request header value, or `""`.
    pub fn get_header(&self, key: &str) -> &str {
        self.request.header(key).unwrap_or("")
    }

    /// Raw value of the named request cookie. Not unescaped.
    pub fn cookie(&self, name: &str) -> Result<&str, CookieError> {
        self.request
            .headers()
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|line| line.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.trim_matches('"'))
            .ok_or_else(|| CookieError::NotFound(name.to_owned()))
    }

    // ── Response ──────────────────────────────────────────────────────────────

    pub fn response(&self) -> &ResponseWriter { &self.writer }
    pub fn response_mut(&mut self) -> &mut ResponseWriter { &mut self.writer }

    /// The committed status, `200` if nothing has been written.
    pub fn status_code(&self) -> StatusCode {
        self.writer.status()
    }

    /// Commit the status line and headers. The first commit wins.
    pub fn status(&mut self, code: StatusCode) {
        self.writer.write_header(code);
    }

    pub fn set_header(&mut self, key: &str, value: &str) {
        self.writer.set_header(key, value);
    }

    /// Append a `Set-Cookie` header. `value` is percent-escaped; an empty
    /// `path` means `/`. `max_age` of zero omits the attribute, a negative
    /// one expires the cookie immediately.
    #[allow(clippy::too_many_arguments)]
    pub fn set_cookie(
        &mut self,
        name: &str,
        value: &str,
        max_age: i64,
        path: &str,
        domain: &str,
        secure: bool,
        http_only: bool,
    ) {
        let path = if path.is_empty() { "/" } else { path };
        let mut cookie = format!("{name}={}; Path={path}", urlencoding::encode(value));
        if !domain.is_empty() {
            cookie.push_str(&format!("; Domain={domain}"));
        }
        match max_age {
            n if n > 0 => cookie.push_str(&format!("; Max-Age={n}")),
            n if n < 0 => cookie.push_str("; Max-Age=0"),
            _ => {}
        }
        if http_only {
            cookie.push_str("; HttpOnly");
        }
        if secure {
            cookie.push_str("; Secure");
        }
        self.writer.append_header(SET_COOKIE.as_str(), &cookie);
    }

    /// `text/plain` body. Pass `format_args!` for formatted output.
    pub fn string(&mut self, code: StatusCode, body: impl fmt::Display) {
        self.set_header(CONTENT_TYPE.as_str(), response::TEXT);
        self.status(code);
        self.writer.write_body(body.to_string().as_bytes());
    }

    /// `application/json` body. A serialization error fails the request with 500.
    pub fn json<T: Serialize + ?Sized>(&mut self, code: StatusCode, obj: &T) {
        match serde_json::to_vec(obj) {
            Ok(body) => {
                self.set_header(CONTENT_TYPE.as_str(), response::JSON);
                self.status(code);
                self.writer.write_body(&body);
            }
            Err(e) => self.fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }

    /// Raw bytes. Defaults to `application/octet-stream` unless a content
    /// type was already set.
    pub fn data(&mut self, code: StatusCode, bytes: impl AsRef<[u8]>) {
        if !self.writer.has_content_type() {
            self.set_header(CONTENT_TYPE.as_str(), response::OCTET_STREAM);
        }
        self.status(code);
        self.writer.write_body(bytes.as_ref());
    }

    /// Render `name` with the attached template engine.
    ///
    /// Rendering happens before anything is committed, so a failed render
    /// reaches the client as a 500 rather than as `code` with half a page.
    pub fn html<T: Serialize + ?Sized>(&mut self, code: StatusCode, name: &str, data: &T) {
        let Some(engine) = self.templates.clone() else {
            return self.fail(StatusCode::INTERNAL_SERVER_ERROR, "no template engine configured");
        };
        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(e) => return self.fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        let mut page = Vec::new();
        match engine.execute_template(&mut page, name, &data) {
            Ok(()) => {
                self.set_header(CONTENT_TYPE.as_str(), response::HTML);
                self.status(code);
                self.writer.write_body(&page);
            }
            Err(e) => self.fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }

    /// Finish the request and hand the response to the transport.
    pub fn into_response(self) -> http::Response<http_body_util::Full<bytes::Bytes>> {
        self.writer.into_http()
    }

    // ── Metadata store ────────────────────────────────────────────────────────

    /// Shareable handle to this request's store, for use from other threads.
    pub fn store(&self) -> &Store { &self.store }

    pub fn set<V: std::any::Any + Send + Sync>(&self, key: impl Into<String>, value: V) {
        self.store.set(key, value);
    }

    pub fn get(&self, key: &str) -> Option<Value> { self.store.get(key) }
    pub fn get_string(&self, key: &str) -> String { self.store.get_string(key) }
    pub fn get_bool(&self, key: &str) -> bool { self.store.get_bool(key) }
    pub fn get_int(&self, key: &str) -> i32 { self.store.get_int(key) }
    pub fn get_int64(&self, key: &str) -> i64 { self.store.get_int64(key) }
    pub fn get_uint(&self, key: &str) -> u32 { self.store.get_uint(key) }
    pub fn get_uint64(&self, key: &str) -> u64 { self.store.get_uint64(key) }
    pub fn get_float64(&self, key: &str) -> f64 { self.store.get_float64(key) }
    pub fn get_time(&self, key: &str) -> DateTime<Utc> { self.store.get_time(key) }
    pub fn get_duration(&self, key: &str) -> Duration { self.store.get_duration(key) }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("request", &self.request)
            .field("params", &self.params)
            .field("index", &self.index)
            .field("handlers", &self.chain.len())
            .field("status", &self.writer.status())
            .finish_non_exhaustive()
    }
}
