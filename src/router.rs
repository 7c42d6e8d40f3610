//! Route registry and matcher.
//!
//! Static paths (no `:name` segment) sit in an exact-match table keyed
//! `"METHOD path"` — one hash lookup on the hot path. Paths with dynamic
//! segments compile into an ordered list per method, scanned in
//! registration order: the first matching pattern wins, deterministically.
//! A single fallback handler catches whatever neither table matched.
//!
//! The table is add-only and duplicate-checked at setup, then frozen behind
//! an `Arc` for the lifetime of the server.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;

use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::pattern::{CompiledPattern, is_dynamic};

struct DynamicRoute {
    pattern: CompiledPattern,
    handler: BoxedHandler,
}

/// The application router. Build it once at startup; pass it to
/// [`Server::serve`](crate::Server::serve).
pub struct Router {
    statics: HashMap<String, BoxedHandler>,
    dynamics: HashMap<Method, Vec<DynamicRoute>>,
    fallback: Option<BoxedHandler>,
}

fn route_key(method: &Method, path: &str) -> String {
    format!("{method} {path}")
}

impl Router {
    pub fn new() -> Self {
        Self { statics: HashMap::new(), dynamics: HashMap::new(), fallback: None }
    }

    /// Registers a handler for a method + path pair. Returns `self` so
    /// registrations chain. Panics on a duplicate or malformed pattern —
    /// route conflicts are setup-fatal, never deferred to request time.
    ///
    /// Path parameters use `:name` syntax; `ctx.param("name")` retrieves
    /// them:
    ///
    /// ```rust,no_run
    /// # use nami::{Context, Method, Router};
    /// # async fn show_user(_: Context) {}
    /// # async fn create_user(_: Context) {}
    /// Router::new()
    ///     .on(Method::GET,  "/users/:id", show_user)
    ///     .on(Method::POST, "/users",     create_user);
    /// ```
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.try_on(method, path, handler)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"))
    }

    /// Fallible registration, for callers that surface setup errors instead
    /// of panicking.
    pub fn try_on(
        mut self,
        method: Method,
        path: &str,
        handler: impl Handler,
    ) -> Result<Self, Error> {
        let handler = handler.into_boxed_handler();
        if is_dynamic(path) {
            let routes = self.dynamics.entry(method.clone()).or_default();
            if routes.iter().any(|r| r.pattern.raw() == path) {
                return Err(Error::RouteConflict { method, path: path.to_owned() });
            }
            routes.push(DynamicRoute { pattern: CompiledPattern::compile(path)?, handler });
        } else {
            let key = route_key(&method, path);
            if self.statics.contains_key(&key) {
                return Err(Error::RouteConflict { method, path: path.to_owned() });
            }
            self.statics.insert(key, handler);
        }
        Ok(self)
    }

    /// Registers the single fallback handler, invoked when no route
    /// matches. Panics if one is already set.
    pub fn fallback(self, handler: impl Handler) -> Self {
        self.try_fallback(handler).unwrap_or_else(|e| panic!("invalid fallback: {e}"))
    }

    pub fn try_fallback(mut self, handler: impl Handler) -> Result<Self, Error> {
        if self.fallback.is_some() {
            return Err(Error::DuplicateFallback);
        }
        self.fallback = Some(handler.into_boxed_handler());
        Ok(self)
    }

    /// Exact table first, then the method's dynamic list in registration
    /// order, then the fallback. `None` means the dispatcher emits a 404.
    pub(crate) fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        if let Some(handler) = self.statics.get(&route_key(method, path)) {
            return Some((Arc::clone(handler), HashMap::new()));
        }
        if let Some(routes) = self.dynamics.get(method) {
            for route in routes {
                if let Some(params) = route.pattern.matches(path) {
                    return Some((Arc::clone(&route.handler), params));
                }
            }
        }
        self.fallback.as_ref().map(|handler| (Arc::clone(handler), HashMap::new()))
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("statics", &self.statics.keys().collect::<Vec<_>>())
            .field("dynamics", &self.dynamics.keys().collect::<Vec<_>>())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
