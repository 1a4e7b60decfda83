//! HTTP server and graceful shutdown.
//!
//! # Request lifecycle
//!
//! 1. hyper parses the request; the body is collected into memory.
//! 2. The [`Router`] resolves it into a [`Context`](crate::Context) carrying
//!    the matched chain (or the global middleware plus a `404` handler).
//! 3. The chain runs to completion on a blocking worker thread. Handlers are
//!    synchronous and may block; they never stall the connection tasks.
//! 4. Whatever the handlers wrote becomes the response.
//!
//! A panic that escapes a chain without [`recovery`](crate::middleware::recovery)
//! is still answered with a 500 and logged; it never takes the server down.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or **Ctrl-C** the server stops accepting connections, lets
//! every in-flight connection finish, then returns from [`Server::serve`].

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, Bytes};
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::request::Request;
use crate::response::ResponseWriter;
use crate::router::Router;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr }
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns only after a full graceful shutdown.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let router = Arc::new(router);

        info!(addr = %self.addr, "weft listening");

        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a SIGTERM stops accepting at once.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let router = Arc::clone(&router);
                            async move { dispatch(router, req).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the set stays small.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("weft stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

async fn dispatch(
    router: Arc<Router>,
    req: hyper::Request<hyper::body::Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("failed to read request body: {e}");
            return Ok(ResponseWriter::message(StatusCode::BAD_REQUEST, "unreadable request body"));
        }
    };

    Ok(handle(router, parts, body).await)
}

/// Resolve and run one request whose body is already in memory.
async fn handle(
    router: Arc<Router>,
    parts: http::request::Parts,
    body: Bytes,
) -> http::Response<Full<Bytes>> {
    let mut ctx = router.context(Request::new(parts, body.reader()));

    let outcome = tokio::task::spawn_blocking(move || {
        ctx.next();
        ctx.into_response()
    })
    .await;

    outcome.unwrap_or_else(|e| {
        error!("handler chain aborted: {e}");
        ResponseWriter::message(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    })
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C only on Windows).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
