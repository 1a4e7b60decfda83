//! Content binder: decode a request body into a typed value.
//!
//! The binder trusts the declared `Content-Length` and performs one bounded
//! read of exactly that many bytes. It never reads past the declared length,
//! and a body that ends early is an error rather than a partial decode.
//!
//! Errors come back to the handler. Deciding what to tell the client about a
//! body that would not bind is the handler's job.

use std::io::Read;

use http::Method;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use serde::de::DeserializeOwned;

use crate::context::Context;
use crate::error::BindError;

/// Bodies this large or larger are still read, but not preallocated.
const PREALLOC_LIMIT: u64 = 64 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Json,
    Xml,
}

fn negotiate(content_type: &str) -> Option<Format> {
    let mime: mime::Mime = content_type.parse().ok()?;
    let (kind, sub, suffix) = (mime.type_(), mime.subtype(), mime.suffix());

    if (kind == mime::APPLICATION && sub == mime::JSON) || suffix == Some(mime::JSON) {
        Some(Format::Json)
    } else if ((kind == mime::APPLICATION || kind == mime::TEXT) && sub == mime::XML)
        || suffix == Some(mime::XML)
    {
        Some(Format::Xml)
    } else {
        None
    }
}

impl Context {
    /// Bind by `Content-Type`: JSON or XML, anything else is
    /// [`BindError::UnsupportedMediaType`].
    pub fn should_bind<T: DeserializeOwned>(&mut self) -> Result<T, BindError> {
        let content_type = self.get_header(CONTENT_TYPE.as_str());
        match negotiate(content_type) {
            Some(Format::Json) => self.should_bind_json(),
            Some(Format::Xml) => self.should_bind_xml(),
            None => Err(BindError::UnsupportedMediaType(content_type.to_owned())),
        }
    }

    pub fn should_bind_json<T: DeserializeOwned>(&mut self) -> Result<T, BindError> {
        let body = self.read_declared_body()?;
        serde_json::from_slice(&body).map_err(|e| BindError::Decode(Box::new(e)))
    }

    pub fn should_bind_xml<T: DeserializeOwned>(&mut self) -> Result<T, BindError> {
        let body = self.read_declared_body()?;
        quick_xml::de::from_reader(body.as_slice()).map_err(|e| BindError::Decode(Box::new(e)))
    }

    fn read_declared_body(&mut self) -> Result<Vec<u8>, BindError> {
        if *self.method() == Method::GET {
            return Err(BindError::InvalidRequest(Method::GET));
        }

        let declared = self.get_header(CONTENT_LENGTH.as_str());
        let expected: u64 = declared
            .trim()
            .parse()
            .map_err(|_| BindError::MalformedLength(declared.to_owned()))?;

        let mut body = Vec::with_capacity(expected.min(PREALLOC_LIMIT) as usize);
        self.request.body.by_ref().take(expected).read_to_end(&mut body)?;

        let actual = body.len() as u64;
        if actual < expected {
            return Err(BindError::TruncatedBody { expected, actual });
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Chain;
    use crate::request::Params;
    use bytes::Bytes;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        name: String,
    }

    fn request(method: Method, content_type: &str, length: Option<&str>, body: &'static str) -> Context {
        let mut builder = http::Request::builder().method(method).uri("/users");
        if !content_type.is_empty() {
            builder = builder.header("content-type", content_type);
        }
        if let Some(length) = length {
            builder = builder.header("content-length", length);
        }
        let req = builder.body(Bytes::from_static(body.as_bytes())).unwrap();
        Context::new(req, Params::new(), Chain::new())
    }

    #[test]
    fn binds_json_post() {
        let mut c = request(Method::POST, "application/json", Some("13"), r#"{"name":"Al"}"#);
        let user: User = c.should_bind().unwrap();
        assert_eq!(user, User { name: "Al".into() });
    }

    #[test]
    fn get_has_no_body_to_bind() {
        let mut c = request(Method::GET, "application/json", Some("13"), r#"{"name":"Al"}"#);
        assert!(matches!(c.should_bind::<User>(), Err(BindError::InvalidRequest(m)) if m == Method::GET));
    }

    #[test]
    fn binds_xml_with_either_xml_type() {
        let body = "<user><name>Al</name></user>";
        let len = body.len().to_string();

        for content_type in ["application/xml", "text/xml; charset=utf-8"] {
            let mut c = request(Method::PUT, content_type, Some(len.as_str()), body);
            let user: User = c.should_bind().unwrap();
            assert_eq!(user.name, "Al");
        }
    }

    #[test]
    fn json_content_type_parameters_and_suffixes_are_accepted() {
        let mut c = request(Method::POST, "application/json; charset=utf-8", Some("13"), r#"{"name":"Al"}"#);
        assert!(c.should_bind::<User>().is_ok());

        let mut c = request(Method::POST, "application/merge-patch+json", Some("13"), r#"{"name":"Al"}"#);
        assert!(c.should_bind::<User>().is_ok());
    }

    #[test]
    fn other_or_missing_content_type_is_unsupported() {
        let mut c = request(Method::POST, "text/plain", Some("2"), "hi");
        assert!(matches!(c.should_bind::<User>(), Err(BindError::UnsupportedMediaType(t)) if t == "text/plain"));

        let mut c = request(Method::POST, "", Some("2"), "hi");
        assert!(matches!(c.should_bind::<User>(), Err(BindError::UnsupportedMediaType(t)) if t.is_empty()));
    }

    #[test]
    fn missing_or_bad_length_is_malformed() {
        for length in [None, Some("abc"), Some("-1")] {
            let mut c = request(Method::POST, "application/json", length, r#"{"name":"Al"}"#);
            assert!(matches!(c.should_bind_json::<User>(), Err(BindError::MalformedLength(_))));
        }
    }

    #[test]
    fn short_body_is_truncated_not_partially_decoded() {
        let mut c = request(Method::POST, "application/json", Some("20"), r#"{"name":"Al"}"#);
        assert!(matches!(
            c.should_bind_json::<User>(),
            Err(BindError::TruncatedBody { expected: 20, actual: 13 })
        ));
    }

    #[test]
    fn never_reads_past_declared_length() {
        let mut c = request(Method::POST, "application/json", Some("13"), r#"{"name":"Al"}trailing"#);
        assert!(c.should_bind_json::<User>().is_ok());

        // Only the 8 trailing bytes are left in the stream.
        assert!(matches!(
            c.should_bind_json::<User>(),
            Err(BindError::TruncatedBody { expected: 13, actual: 8 })
        ));
    }

    #[test]
    fn undecodable_body_is_a_decode_error() {
        let mut c = request(Method::POST, "application/json", Some("5"), "{nope");
        assert!(matches!(c.should_bind_json::<User>(), Err(BindError::Decode(_))));

        let mut c = request(Method::POST, "application/xml", Some("6"), "<user>");
        assert!(matches!(c.should_bind_xml::<User>(), Err(BindError::Decode(_))));
    }
}
