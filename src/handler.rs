//! Handler trait and type erasure.
//!
//! The router holds handlers of *different* concrete types in one table, so
//! each registered function is hidden behind a trait object. The chain from
//! user code to vtable call:
//!
//! ```text
//! async fn show(ctx: Context) -> Result<(), HttpError> { … }
//!        ↓ router.on(Method::GET, "/users/:id", show)
//! show.into_boxed_handler()              ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(show))              ← stored as BoxedHandler
//!        ↓
//! handler.call(ctx)  at request time     ← one Arc clone + one virtual call
//! ```
//!
//! A handler may return `()` (it drove the response itself) or
//! `Result<(), E>` for any `E` convertible into [`HttpError`]; the
//! [`IntoOutcome`] trait folds both into the short-circuiting result the
//! dispatcher inspects.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::HttpError;

// ── Internal types ────────────────────────────────────────────────────────────

pub(crate) type BoxFuture =
    Pin<Box<dyn Future<Output = Result<(), HttpError>> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, ctx: Context) -> BoxFuture;
}

/// A heap-allocated, type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Outcome conversion ────────────────────────────────────────────────────────

/// What a handler is allowed to return.
pub trait IntoOutcome {
    fn into_outcome(self) -> Result<(), HttpError>;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Result<(), HttpError> {
        Ok(())
    }
}

impl<E: Into<HttpError>> IntoOutcome for Result<(), E> {
    fn into_outcome(self) -> Result<(), HttpError> {
        self.map_err(Into::into)
    }
}

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` with the signature:
///
/// ```text
/// async fn name(ctx: Context) -> impl IntoOutcome
/// ```
///
/// The trait is **sealed**: only the blanket impl below can satisfy it,
/// which keeps the API surface stable across versions.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Bridges a concrete handler `F` into the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn call(&self, ctx: Context) -> BoxFuture {
        let fut = (self.0)(ctx);
        Box::pin(async move { fut.await.into_outcome() })
    }
}
