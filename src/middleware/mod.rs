//! Standard middleware.
//!
//! Each constructor returns an ordinary [`Handler`](crate::Handler) that calls
//! [`Context::next`](crate::Context::next) to run the rest of the chain. Put
//! them at the front of a [`Chain`](crate::Chain), outermost first:
//!
//! ```rust
//! use std::time::Duration;
//! use weft::{Chain, Context, middleware};
//!
//! let chain = Chain::new()
//!     .then(middleware::logger())
//!     .then(middleware::recovery())
//!     .then(middleware::cors())
//!     .then(middleware::rate_limit(Duration::from_millis(100), 50))
//!     .then(|c: &mut Context| c.string(http::StatusCode::OK, "ok"));
//! # assert_eq!(chain.len(), 5);
//! ```
//!
//! | Middleware | Before `next` | After `next` | Short-circuits |
//! |---|---|---|---|
//! | [`logger`] | start timer | log status, URI, elapsed | never |
//! | [`recovery`] | - | turn a panic into `500` | on panic |
//! | [`cors`] | set CORS headers | - | `OPTIONS` → `204` |
//! | [`rate_limit`] | take a token | - | empty bucket → `200` + message |

mod cors;
mod logger;
mod rate_limit;
mod recovery;

pub use cors::{RESPONSE_FORMAT_KEY, cors};
pub use logger::logger;
pub use rate_limit::{TokenBucket, rate_limit, rate_limit_with};
pub use recovery::recovery;
