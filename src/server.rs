//! HTTP server, request dispatcher, hard shutdown.
//!
//! # Dispatch model
//!
//! Each connection runs as its own task; each request on a connection is
//! dispatched as a further **detached** task. The dispatcher never awaits
//! handler completion — it awaits only the response's commit signal, then
//! hands hyper a streaming body. A slow handler therefore never blocks the
//! next request on the connection; its progress is observable through the
//! commit signal and stream exhaustion alone.
//!
//! # Shutdown
//!
//! Stopping is **hard**: the first SIGTERM / Ctrl-C stops the accept loop
//! and force-closes every open connection, which may truncate in-flight
//! streamed output. The shutdown hook registered with
//! [`Server::on_shutdown`] runs afterwards, purely for cleanup. Put a
//! draining proxy in front if you need graceful termination.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::combinators::BoxBody;
use http_body_util::{Empty, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{Instrument, debug, error, info, warn};

use crate::body::RequestBody;
use crate::config::Config;
use crate::context::Context;
use crate::cors;
use crate::error::{Error, HttpError};
use crate::handler::BoxedHandler;
use crate::interceptor::intercept;
use crate::response::{Response, ResponseState};
use crate::router::Router;

type OutBody = BoxBody<Bytes, Infallible>;
type ShutdownHook = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
    config: Config,
    on_shutdown: Option<ShutdownHook>,
}

struct Shared {
    router: Router,
    config: Arc<Config>,
}

impl Server {
    /// Configures the server to bind to `addr` when
    /// [`serve`](Server::serve) is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr, config: Config::default(), on_shutdown: None }
    }

    /// Supplies the application config (CORS options plus handler-visible
    /// settings). Defaults to an empty config.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Registers a cleanup hook invoked after connections have been
    /// force-closed, right before [`serve`](Server::serve) returns.
    pub fn on_shutdown<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_shutdown = Some(Box::new(move || Box::pin(hook())));
        self
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns after a shutdown signal: accept stops immediately, open
    /// connections are aborted, the shutdown hook runs.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        let Server { addr, config, on_shutdown } = self;
        let listener = TcpListener::bind(addr).await?;
        let shared = Arc::new(Shared { router, config: Arc::new(config) });

        info!(addr = %addr, "nami listening");

        // JoinSet tracks every connection task so shutdown can abort them.
        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // `biased` checks arms top-to-bottom: a signal must stop
                // the accept loop even when connections are queued.
                biased;

                () = &mut shutdown => {
                    warn!(in_flight = tasks.len(), "shutdown signal received, force-closing connections");
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

                    let shared = Arc::clone(&shared);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // One `service_fn` call per request on the
                        // connection, not per connection.
                        let svc = service_fn(move |req| {
                            let shared = Arc::clone(&shared);
                            async move { dispatch(shared, req, remote_addr).await }
                        });

                        // auto::Builder negotiates HTTP/1.1 or HTTP/2.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            debug!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the set stays bounded.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Hard stop, no drain. Truncated in-flight output is the documented
        // default; the hook below is for cleanup only.
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}

        if let Some(hook) = on_shutdown {
            hook().await;
        }

        info!("nami stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Core hot path: one request in, one (possibly still-streaming) response
/// out.
///
/// The error type is [`Infallible`] — every failure is turned into HTTP
/// semantics before hyper sees it.
async fn dispatch(
    shared: Arc<Shared>,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<OutBody>, Infallible> {
    let (parts, incoming) = req.into_parts();
    let method = parts.method.clone();
    let path = parts.uri.path().to_owned();

    let span = tracing::debug_span!("request", method = %method, path = %path);
    span.in_scope(|| debug!("request received"));

    let (res, mut rx) = Response::channel();

    let preflight = match shared.config.cors.as_ref() {
        Some(cors_config) => cors::apply(cors_config, &method, &parts.headers, &res),
        None => false,
    };

    if preflight {
        span.in_scope(|| debug!(status = 204, "preflight answered"));
    } else {
        match shared.router.lookup(&method, &path) {
            Some((handler, params)) => {
                let body = RequestBody::new(&parts.headers, incoming);
                let ctx = Context::new(
                    method.clone(),
                    &parts.uri,
                    parts.headers,
                    params,
                    remote_addr,
                    Arc::clone(&shared.config),
                    body,
                    res.clone(),
                );
                // Detached: dispatch returns at commit time, not completion.
                tokio::spawn(settle(handler, ctx, res.clone()).instrument(span.clone()));
            }
            None => {
                intercept(HttpError::new(StatusCode::NOT_FOUND, "Not Found"), &res);
                span.in_scope(|| warn!(status = 404, "response completed"));
            }
        }
    }

    // Drop our handle: a crashed handler must be observable as a lost
    // commit signal, not a hang.
    drop(res);

    let head = rx.committed().await;
    let chunks = UnboundedReceiverStream::new(rx.into_body())
        .map(|chunk| Ok::<_, Infallible>(Frame::data(chunk)));
    let body: OutBody = BoxBody::new(StreamBody::new(chunks));

    let mut builder = http::Response::builder();
    match head {
        Some(head) => {
            builder = builder.status(head.status);
            for (name, value) in &head.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        None => {
            span.in_scope(|| error!("response dropped before commit"));
            builder = builder.status(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    Ok(builder.body(body).unwrap_or_else(|e| {
        error!("malformed response head: {e}");
        let mut fallback = http::Response::new(BoxBody::new(Empty::new()));
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    }))
}

/// Runs one handler to settlement: failures go to the interceptor, a
/// stream left unclosed on `Ok` is ended, and the completed-response
/// entry is logged.
async fn settle(handler: BoxedHandler, ctx: Context, res: Response) {
    if let Err(err) = handler.call(ctx).await {
        intercept(err, &res);
    } else if res.state() != ResponseState::Closed {
        res.end();
    }
    let status = res.status();
    if status.is_client_error() {
        warn!(status = status.as_u16(), "response completed");
    } else {
        debug!(status = status.as_u16(), "response completed");
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives: SIGTERM or
/// SIGINT (Ctrl-C) on Unix, Ctrl-C elsewhere.
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
        () = ctrl_c => {}
        () = sigterm => {}
    }
}
