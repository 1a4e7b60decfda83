use http::{Method, StatusCode};

use crate::context::Context;
use crate::handler::Handler;

/// Store key set to `"application/json"` on cross-origin requests, telling
/// later handlers to answer in JSON.
pub const RESPONSE_FORMAT_KEY: &str = "content-type";

const CORS_HEADERS: [(&str, &str); 6] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "POST, GET, OPTIONS, PUT, DELETE, UPDATE"),
    (
        "Access-Control-Allow-Headers",
        "Authorization, Content-Length, X-CSRF-Token, Token, Session, X-Requested-With, \
         Accept, Origin, Host, Connection, Accept-Encoding, Accept-Language, DNT, \
         X-CustomHeader, Keep-Alive, User-Agent, If-Modified-Since, Cache-Control, \
         Content-Type, Pragma",
    ),
    (
        "Access-Control-Expose-Headers",
        "Content-Length, Access-Control-Allow-Origin, Access-Control-Allow-Headers, \
         Cache-Control, Content-Language, Content-Type, Expires, Last-Modified, Pragma",
    ),
    // 48 hours
    ("Access-Control-Max-Age", "172800"),
    ("Access-Control-Allow-Credentials", "false"),
];

/// Permissive cross-origin headers, and preflight handling.
///
/// Requests with an `Origin` header get the wildcard CORS headers and the
/// [`RESPONSE_FORMAT_KEY`] marker. `OPTIONS` requests end here with
/// `204 No Content`; nothing downstream runs for a preflight.
pub fn cors() -> impl Handler {
    |c: &mut Context| {
        if !c.get_header("origin").is_empty() {
            for (name, value) in CORS_HEADERS {
                c.set_header(name, value);
            }
            c.set(RESPONSE_FORMAT_KEY, "application/json");
        }

        if *c.method() == Method::OPTIONS {
            c.abort(StatusCode::NO_CONTENT, "No Content");
            return;
        }

        c.next();
    }
}
