//! Unified error types.
//!
//! Two tiers, split by phase:
//!
//! - [`Error`] — setup and infrastructure: route registration, config
//!   loading, binding a port. Fatal before the server serves anything.
//! - [`HttpError`] — per-request failures with HTTP semantics. Every
//!   handler failure is normalized into one of these and funnelled through
//!   the interceptor; 4xx payloads reach the client verbatim, 5xx payloads
//!   stay in the logs.

use std::fmt;

use http::StatusCode;
use serde_json::Value;

/// The error type returned by nami's fallible setup operations.
///
/// Application-level failures (404, malformed bodies, handler errors) are
/// expressed as [`HttpError`] values, not as `Error`s.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A `(method, path)` pair was registered twice.
    #[error("duplicate route `{method} {path}`")]
    RouteConflict { method: http::Method, path: String },

    /// A second fallback handler was registered.
    #[error("fallback handler already registered")]
    DuplicateFallback,

    /// A route pattern failed to compile.
    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

// ── HttpError ─────────────────────────────────────────────────────────────────

/// Body of an [`HttpError`]. The variant doubles as the content-type tag.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorPayload {
    /// Sent as `text/plain; charset=utf-8`.
    Text(String),
    /// Sent as `application/json`, serialized.
    Json(Value),
}

impl ErrorPayload {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Text(_) => "text/plain; charset=utf-8",
            Self::Json(_) => "application/json",
        }
    }

    pub(crate) fn to_bytes(&self) -> bytes::Bytes {
        match self {
            Self::Text(s) => bytes::Bytes::copy_from_slice(s.as_bytes()),
            Self::Json(v) => bytes::Bytes::from(v.to_string().into_bytes()),
        }
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

impl From<String> for ErrorPayload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for ErrorPayload {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<Value> for ErrorPayload {
    fn from(v: Value) -> Self {
        Self::Json(v)
    }
}

/// A failure with HTTP semantics: a status code plus a typed payload.
///
/// Returned (via `?`) from handlers and assertion helpers; intercepted in
/// exactly one place per request. `From` conversions normalize foreign
/// failures to `500` so any error a handler bubbles up lands here.
#[derive(Debug, thiserror::Error)]
#[error("{status}: {payload}")]
pub struct HttpError {
    pub status: StatusCode,
    pub payload: ErrorPayload,
}

impl HttpError {
    pub fn new(status: StatusCode, payload: impl Into<ErrorPayload>) -> Self {
        Self { status, payload: payload.into() }
    }

    /// `500` with a text payload. The payload is logged, never sent.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg.into())
    }
}

impl From<std::io::Error> for HttpError {
    fn from(e: std::io::Error) -> Self {
        Self::internal(format!("io: {e}"))
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(e: serde_json::Error) -> Self {
        Self::internal(format!("json: {e}"))
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for HttpError {
    fn from(e: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::internal(e.to_string())
    }
}

impl From<String> for HttpError {
    fn from(msg: String) -> Self {
        Self::internal(msg)
    }
}

impl From<&str> for HttpError {
    fn from(msg: &str) -> Self {
        Self::internal(msg)
    }
}

/// A bare data value bubbling out of a handler becomes a serialized 500.
impl From<Value> for HttpError {
    fn from(v: Value) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, v)
    }
}

impl From<std::convert::Infallible> for HttpError {
    fn from(e: std::convert::Infallible) -> Self {
        match e {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_tags_content_type() {
        assert_eq!(ErrorPayload::from("nope").content_type(), "text/plain; charset=utf-8");
        assert_eq!(
            ErrorPayload::from(serde_json::json!({"k": 1})).content_type(),
            "application/json"
        );
    }

    #[test]
    fn foreign_errors_normalize_to_500() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = HttpError::from(io);
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("disk gone"));

        let err = HttpError::from(serde_json::json!({"reason": "bad"}));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(matches!(err.payload, ErrorPayload::Json(_)));
    }

    #[test]
    fn route_conflict_names_the_pair() {
        let err = Error::RouteConflict { method: http::Method::GET, path: "/users".into() };
        assert_eq!(err.to_string(), "duplicate route `GET /users`");
    }
}
