//! Built-in health-check handlers.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? |
//! | **Readiness** | `/readyz` | Can it serve traffic? |
//!
//! Register them on your router:
//!
//! ```rust,no_run
//! use nami::{Method, Router, health};
//!
//! let app = Router::new()
//!     .on(Method::GET, "/healthz", health::liveness)
//!     .on(Method::GET, "/readyz", health::readiness);
//! ```
//!
//! Replace `readiness` with your own handler to gate on dependency
//! availability (database connections, downstream services).

use crate::Context;

/// Liveness probe handler.
///
/// Always `200 OK` with body `"ok"` — if the process can answer HTTP at
/// all, it is alive. Intentionally dependency-free.
pub async fn liveness(ctx: Context) {
    ctx.res().text("ok");
}

/// Readiness probe handler (default implementation).
///
/// `200 OK` with body `"ready"`. Swap in your own handler if the
/// application needs a warm-up period.
pub async fn readiness(ctx: Context) {
    ctx.res().text("ready");
}
