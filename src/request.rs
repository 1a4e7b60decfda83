//! The request half of a [`Context`](crate::Context).

use std::fmt;
use std::io::Read;

use bytes::{Buf, Bytes};
use http::{HeaderMap, Method, Uri};

/// An inbound request: method, target, headers, and an unread body stream.
///
/// The body is a plain [`Read`]er so the binder can perform one bounded read
/// of exactly `Content-Length` bytes. The server hands over the collected
/// body; tests can hand over anything readable.
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    pub(crate) body: Box<dyn Read + Send>,
}

impl Request {
    pub fn new(parts: http::request::Parts, body: impl Read + Send + 'static) -> Self {
        // A malformed query string reads as "no query parameters".
        let query = parts
            .uri
            .query()
            .and_then(|q| serde_urlencoded::from_str(q).ok())
            .unwrap_or_default();

        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            query,
            body: Box::new(body),
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }

    /// Path plus query, as it appeared on the request line.
    pub fn request_uri(&self) -> &str {
        self.uri.path_and_query().map_or_else(|| self.uri.path(), |pq| pq.as_str())
    }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// First value of the named query parameter.
    pub fn query(&self, key: &str) -> Option<&str> {
        first(&self.query, key)
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::new(parts, body.reader())
    }
}

impl From<http::Request<()>> for Request {
    fn from(req: http::Request<()>) -> Self {
        let (parts, ()) = req.into_parts();
        Self::new(parts, std::io::empty())
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Path parameters matched by the router, in path order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        first(&self.0, name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

pub(crate) fn first<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_is_parsed_once_and_first_value_wins() {
        let req: Request = http::Request::get("/search?q=rust&q=go&page=2&name=a%20b")
            .body(())
            .unwrap()
            .into();

        assert_eq!(req.query("q"), Some("rust"));
        assert_eq!(req.query("page"), Some("2"));
        assert_eq!(req.query("name"), Some("a b"));
        assert_eq!(req.query("missing"), None);
        assert_eq!(req.request_uri(), "/search?q=rust&q=go&page=2&name=a%20b");
        assert_eq!(req.path(), "/search");
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req: Request = http::Request::get("/")
            .header("X-Trace-Id", "abc")
            .body(())
            .unwrap()
            .into();
        assert_eq!(req.header("x-trace-id"), Some("abc"));
        assert_eq!(req.header("X-TRACE-ID"), Some("abc"));
    }

    #[test]
    fn params_keep_router_order() {
        let params: Params = [("org", "acme"), ("repo", "weft")].into_iter().collect();
        let names: Vec<_> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["org", "repo"]);
        assert_eq!(params.get("repo"), Some("weft"));
        assert_eq!(params.get("nope"), None);
    }
}
