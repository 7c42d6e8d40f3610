//! # nami
//!
//! A streaming-first HTTP dispatch framework for Rust services.
//!
//! ## The contract
//!
//! The transport does transport things. nami does dispatch things:
//!
//! - **Routing** — an exact-match table plus ordered `:name` patterns;
//!   first registration wins, conflicts fail at setup.
//! - **Streaming responses** — a deferred header-commit protocol: nothing
//!   hits the wire until the first write, completion is observable through
//!   a one-shot commit signal plus stream exhaustion.
//! - **Error interception** — every handler failure is normalized into HTTP
//!   semantics at exactly one point per request; 5xx detail goes to the
//!   logs, never to the client.
//! - **Content negotiation** — typed body accessors driven by the declared
//!   `Content-Type`, and CORS negotiation with preflight short-circuiting.
//!
//! What nami intentionally ignores — TLS termination, connection pooling,
//! HTTP/2 multiplexing internals, load shedding — belongs to the
//! transport (hyper) and whatever fronts your service.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use nami::{Context, HttpError, Method, Router, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .on(Method::GET,  "/users/:id", show_user)
//!         .on(Method::POST, "/users",     create_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn show_user(ctx: Context) -> Result<(), HttpError> {
//!     let id = ctx.param("id").unwrap_or("unknown").to_owned();
//!     ctx.res().not_found(id == "0", "no such user")?;
//!     ctx.res().json(&serde_json::json!({ "id": id, "name": "alice" }))
//! }
//!
//! async fn create_user(mut ctx: Context) -> Result<(), HttpError> {
//!     let input = ctx.body().json().await?;
//!     ctx.res().bad_request(input.get("name").is_none(), "missing `name`")?;
//!     ctx.res().set_status(StatusCode::CREATED);
//!     ctx.res().json(&input)
//! }
//! ```

mod body;
mod config;
mod context;
mod cookies;
mod cors;
mod error;
mod handler;
mod interceptor;
mod pattern;
mod response;
mod router;
mod server;

pub mod health;
pub mod ws;

pub use body::{BodyDescriptor, BodyKind, Parsed, RequestBody};
pub use config::Config;
pub use context::Context;
pub use cookies::{Cookie, SameSite};
pub use cors::{CorsConfig, CorsOrigin};
pub use error::{Error, ErrorPayload, HttpError};
pub use handler::{Handler, IntoOutcome};
pub use response::{Response, ResponseHead, ResponseReceiver, ResponseState};
pub use router::Router;
pub use server::Server;

// Request metadata is expressed in `http` types rather than bespoke enums.
pub use http::{Method, StatusCode};
