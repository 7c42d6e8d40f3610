//! CORS negotiation.
//!
//! Applied by the dispatcher before route lookup. Simple requests get the
//! `Access-Control-Allow-*` response headers while the response is still
//! Open; an `OPTIONS` preflight is answered directly — `204 No Content`,
//! `Content-Length: 0` — and never reaches a handler.
//!
//! Without a `[cors]` config section, or when the request carries no
//! `Origin` header, nothing is added and dispatch proceeds normally.

use http::{HeaderMap, Method, StatusCode, header};
use serde::Deserialize;

use crate::response::Response;

/// The preflight method list browsers assume when none is configured.
const DEFAULT_METHODS: &str = "GET,HEAD,PUT,PATCH,POST,DELETE";

/// CORS options, deserialized from the `[cors]` config section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub origin: CorsOrigin,
    /// Preflight `Access-Control-Allow-Methods`; joined with `,`.
    pub methods: Option<Vec<String>>,
    /// Preflight `Access-Control-Allow-Headers`. When absent, the request's
    /// `Access-Control-Request-Headers` is echoed back verbatim.
    pub allowed_headers: Option<Vec<String>>,
    pub exposed_headers: Option<Vec<String>>,
    pub credentials: bool,
    /// Preflight `Access-Control-Max-Age`, in seconds.
    pub max_age: Option<u64>,
}

/// Which origins are allowed.
///
/// In TOML: `origin = "*"`, `origin = "https://app.example.com"`, or
/// `origin = ["https://app.example.com", "*.example.com"]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "OriginRepr")]
pub enum CorsOrigin {
    /// Every origin: the literal `*`. The default.
    Any,
    /// A single value echoed as-is, allowed or not.
    Exact(String),
    /// Allow-list: exact origins or `*.suffix` subdomain wildcards. A
    /// matching request origin is echoed back; anything else gets the
    /// literal string `false`.
    List(Vec<String>),
}

impl Default for CorsOrigin {
    fn default() -> Self {
        Self::Any
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OriginRepr {
    One(String),
    Many(Vec<String>),
}

impl From<OriginRepr> for CorsOrigin {
    fn from(repr: OriginRepr) -> Self {
        match repr {
            OriginRepr::One(s) if s == "*" => Self::Any,
            OriginRepr::One(s) => Self::Exact(s),
            OriginRepr::Many(list) => Self::List(list),
        }
    }
}

fn rule_allows(rule: &str, origin: &str) -> bool {
    match rule.strip_prefix("*.") {
        None => rule == origin,
        Some(suffix) => {
            origin.len() > suffix.len() + 1
                && origin.ends_with(suffix)
                && origin.as_bytes()[origin.len() - suffix.len() - 1] == b'.'
        }
    }
}

/// Sets the CORS response headers for this request. Returns `true` when the
/// request was a preflight and the response has been finalized — dispatch
/// must not proceed to route lookup.
pub(crate) fn apply(
    config: &CorsConfig,
    method: &Method,
    headers: &HeaderMap,
    res: &Response,
) -> bool {
    let Some(origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) else {
        return false;
    };

    match &config.origin {
        CorsOrigin::Any => res.set_header("access-control-allow-origin", "*"),
        CorsOrigin::Exact(value) => {
            res.set_header("access-control-allow-origin", value);
            res.vary("Origin");
        }
        CorsOrigin::List(rules) => {
            let allowed = rules.iter().any(|rule| rule_allows(rule, origin));
            res.set_header("access-control-allow-origin", if allowed { origin } else { "false" });
            res.vary("Origin");
        }
    }

    if config.credentials {
        res.set_header("access-control-allow-credentials", "true");
    }
    if let Some(exposed) = &config.exposed_headers {
        res.set_header("access-control-expose-headers", &exposed.join(","));
    }

    if method != Method::OPTIONS {
        return false;
    }

    // Preflight: answer in place.
    let methods = config
        .methods
        .as_ref()
        .map_or_else(|| DEFAULT_METHODS.to_owned(), |m| m.join(","));
    res.set_header("access-control-allow-methods", &methods);

    match &config.allowed_headers {
        Some(list) => res.set_header("access-control-allow-headers", &list.join(",")),
        None => {
            let requested = headers
                .get("access-control-request-headers")
                .and_then(|v| v.to_str().ok());
            if let Some(requested) = requested {
                res.set_header("access-control-allow-headers", requested);
                res.vary("Access-Control-Request-Headers");
            }
        }
    }

    if let Some(max_age) = config.max_age {
        res.set_header("access-control-max-age", &max_age.to_string());
    }

    res.set_status(StatusCode::NO_CONTENT);
    res.set_header("content-length", "0");
    res.end();
    true
}
