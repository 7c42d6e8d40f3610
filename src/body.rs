//! Request-body negotiation and typed accessors.
//!
//! The declared `Content-Type` resolves — once, at context creation — into a
//! [`BodyDescriptor`]: a body kind plus charset. The accessors then enforce
//! it: [`text`](RequestBody::text) and [`json`](RequestBody::json) refuse
//! kinds they cannot honor with a `415`, and any decode or parse failure
//! becomes a `400` with the body `Invalid format` — the underlying parse
//! error never reaches the client.
//!
//! The accessor is single-shot over the transport stream: the first call
//! collects hyper's `Incoming`, later calls reuse the cached bytes.

use bytes::Bytes;
use http::{HeaderMap, StatusCode, header::CONTENT_TYPE};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::HttpError;

// ── Content-Type resolution ───────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Text,
    Raw,
}

/// Body kind and charset, derived once from the `Content-Type` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BodyDescriptor {
    kind: BodyKind,
    charset: Option<String>,
    explicit_charset: bool,
}

impl BodyDescriptor {
    /// Resolution rules: `application/json` → Json (utf-8 default);
    /// `application/x-www-form-urlencoded` → Text (us-ascii default);
    /// `text/*` or any type carrying an explicit charset → Text; else Raw.
    pub fn from_content_type(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self { kind: BodyKind::Raw, charset: None, explicit_charset: false };
        };
        let mut parts = value.split(';');
        let mime = parts.next().unwrap_or("").trim().to_ascii_lowercase();
        let explicit = parts
            .map(|p| p.trim().to_ascii_lowercase())
            .find_map(|p| p.strip_prefix("charset=").map(|c| c.trim_matches('"').to_owned()));

        let explicit_charset = explicit.is_some();
        match mime.as_str() {
            "application/json" => Self {
                kind: BodyKind::Json,
                charset: explicit.or_else(|| Some("utf-8".to_owned())),
                explicit_charset,
            },
            "application/x-www-form-urlencoded" => Self {
                kind: BodyKind::Text,
                charset: explicit.or_else(|| Some("us-ascii".to_owned())),
                explicit_charset,
            },
            m if m.starts_with("text/") => {
                Self { kind: BodyKind::Text, charset: explicit, explicit_charset }
            }
            _ if explicit_charset => Self { kind: BodyKind::Text, charset: explicit, explicit_charset },
            _ => Self { kind: BodyKind::Raw, charset: None, explicit_charset: false },
        }
    }

    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    fn readable_as_text(&self) -> bool {
        self.kind == BodyKind::Text || self.explicit_charset
    }
}

/// Outcome of the generic [`parse`](RequestBody::parse) dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    Json(Value),
    Text(String),
    Raw(Bytes),
}

// ── Accessor ──────────────────────────────────────────────────────────────────

enum Source {
    Transport(Incoming),
    Buffered(Bytes),
}

/// Single-shot accessor over the request body.
pub struct RequestBody {
    descriptor: BodyDescriptor,
    source: Option<Source>,
    cached: Option<Bytes>,
}

impl RequestBody {
    pub(crate) fn new(headers: &HeaderMap, incoming: Incoming) -> Self {
        let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
        Self {
            descriptor: BodyDescriptor::from_content_type(content_type),
            source: Some(Source::Transport(incoming)),
            cached: None,
        }
    }

    /// Accessor over an in-memory buffer — handler tests, non-hyper callers.
    pub fn buffered(content_type: Option<&str>, bytes: impl Into<Bytes>) -> Self {
        Self {
            descriptor: BodyDescriptor::from_content_type(content_type),
            source: Some(Source::Buffered(bytes.into())),
            cached: None,
        }
    }

    pub fn descriptor(&self) -> &BodyDescriptor {
        &self.descriptor
    }

    /// Collects the transport stream on first call, cached afterwards.
    async fn bytes(&mut self) -> Result<Bytes, HttpError> {
        if let Some(cached) = &self.cached {
            return Ok(cached.clone());
        }
        let collected = match self.source.take() {
            Some(Source::Transport(incoming)) => incoming
                .collect()
                .await
                .map_err(|e| HttpError::internal(format!("body read: {e}")))?
                .to_bytes(),
            Some(Source::Buffered(bytes)) => bytes,
            None => Bytes::new(),
        };
        self.cached = Some(collected.clone());
        Ok(collected)
    }

    /// The unparsed byte buffer, whatever the declared type.
    pub async fn raw(&mut self) -> Result<Bytes, HttpError> {
        self.bytes().await
    }

    /// The decoded string. `415` unless the body is text-kind or carries an
    /// explicit charset.
    pub async fn text(&mut self) -> Result<String, HttpError> {
        if !self.descriptor.readable_as_text() {
            return Err(unsupported_media());
        }
        let charset = self.descriptor.charset.clone();
        let bytes = self.bytes().await?;
        decode(&bytes, charset.as_deref())
    }

    /// The parsed JSON value. `415` unless the declared type is json.
    pub async fn json(&mut self) -> Result<Value, HttpError> {
        if self.descriptor.kind != BodyKind::Json {
            return Err(unsupported_media());
        }
        let charset = self.descriptor.charset.clone();
        let bytes = self.bytes().await?;
        let text = decode(&bytes, charset.as_deref())?;
        serde_json::from_str(&text).map_err(|_| invalid_format())
    }

    /// Like [`json`](RequestBody::json), deserialized into `T`.
    pub async fn json_as<T: DeserializeOwned>(&mut self) -> Result<T, HttpError> {
        let value = self.json().await?;
        serde_json::from_value(value).map_err(|_| invalid_format())
    }

    /// Generic dispatch on the declared kind: json → parse, text → decode,
    /// raw → passthrough.
    pub async fn parse(&mut self) -> Result<Parsed, HttpError> {
        match self.descriptor.kind {
            BodyKind::Json => Ok(Parsed::Json(self.json().await?)),
            BodyKind::Text => Ok(Parsed::Text(self.text().await?)),
            BodyKind::Raw => Ok(Parsed::Raw(self.bytes().await?)),
        }
    }
}

fn invalid_format() -> HttpError {
    HttpError::new(StatusCode::BAD_REQUEST, "Invalid format")
}

fn unsupported_media() -> HttpError {
    HttpError::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unsupported Media Type")
}

/// Decodes `bytes` under the given charset label; utf-8 when absent.
/// Unrecognized labels are attempted as utf-8.
fn decode(bytes: &Bytes, charset: Option<&str>) -> Result<String, HttpError> {
    match charset.unwrap_or("utf-8") {
        "us-ascii" | "ascii" => {
            if bytes.is_ascii() {
                Ok(String::from_utf8_lossy(bytes).into_owned())
            } else {
                Err(invalid_format())
            }
        }
        "iso-8859-1" | "latin-1" | "latin1" => Ok(bytes.iter().map(|&b| b as char).collect()),
        _ => std::str::from_utf8(bytes).map(str::to_owned).map_err(|_| invalid_format()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_resolution() {
        let d = BodyDescriptor::from_content_type(Some("application/json"));
        assert_eq!(d.kind(), BodyKind::Json);
        assert_eq!(d.charset(), Some("utf-8"));

        let d = BodyDescriptor::from_content_type(Some("application/x-www-form-urlencoded"));
        assert_eq!(d.kind(), BodyKind::Text);
        assert_eq!(d.charset(), Some("us-ascii"));

        let d = BodyDescriptor::from_content_type(Some("text/css"));
        assert_eq!(d.kind(), BodyKind::Text);
        assert_eq!(d.charset(), None);

        // any type with an explicit charset reads as text
        let d = BodyDescriptor::from_content_type(Some("application/javascript; charset=utf-8"));
        assert_eq!(d.kind(), BodyKind::Text);
        assert_eq!(d.charset(), Some("utf-8"));

        let d = BodyDescriptor::from_content_type(Some("application/octet-stream"));
        assert_eq!(d.kind(), BodyKind::Raw);
        assert_eq!(d.charset(), None);

        let d = BodyDescriptor::from_content_type(None);
        assert_eq!(d.kind(), BodyKind::Raw);
    }

    #[test]
    fn descriptor_parses_quoted_and_cased_charsets() {
        let d = BodyDescriptor::from_content_type(Some(r#"text/html; Charset="ISO-8859-1""#));
        assert_eq!(d.kind(), BodyKind::Text);
        assert_eq!(d.charset(), Some("iso-8859-1"));
    }

    #[tokio::test]
    async fn json_number_body() {
        let mut body = RequestBody::buffered(Some("application/json"), "12345");
        assert_eq!(body.json().await.unwrap(), Value::from(12345));
    }

    #[tokio::test]
    async fn malformed_json_is_invalid_format() {
        let mut body = RequestBody::buffered(Some("application/json"), r#"{"sdf:"#);
        let err = body.json().await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.payload.to_string(), "Invalid format");
    }

    #[tokio::test]
    async fn css_body_reads_as_text() {
        let mut body = RequestBody::buffered(Some("text/css"), "12345");
        assert_eq!(body.text().await.unwrap(), "12345");
    }

    #[tokio::test]
    async fn text_on_json_without_explicit_charset_is_415() {
        let mut body = RequestBody::buffered(Some("application/json"), "{}");
        let err = body.text().await.unwrap_err();
        assert_eq!(err.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

        // an explicit charset opts any type into text
        let mut body = RequestBody::buffered(Some("application/json; charset=utf-8"), "{}");
        assert_eq!(body.text().await.unwrap(), "{}");
    }

    #[tokio::test]
    async fn json_on_raw_kind_is_415() {
        let mut body = RequestBody::buffered(Some("application/octet-stream"), "{}");
        let err = body.json().await.unwrap_err();
        assert_eq!(err.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn ascii_charset_rejects_high_bytes() {
        let mut body =
            RequestBody::buffered(Some("application/x-www-form-urlencoded"), &b"a=\xffb"[..]);
        let err = body.text().await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.payload.to_string(), "Invalid format");
    }

    #[tokio::test]
    async fn latin1_decodes_high_bytes() {
        let mut body = RequestBody::buffered(Some("text/plain; charset=iso-8859-1"), &b"caf\xe9"[..]);
        assert_eq!(body.text().await.unwrap(), "café");
    }

    #[tokio::test]
    async fn repeated_access_returns_cached_bytes() {
        let mut body = RequestBody::buffered(Some("text/plain"), "once");
        assert_eq!(body.raw().await.unwrap(), Bytes::from("once"));
        assert_eq!(body.raw().await.unwrap(), Bytes::from("once"));
        assert_eq!(body.text().await.unwrap(), "once");
    }

    #[tokio::test]
    async fn generic_parse_dispatches_on_kind() {
        let mut body = RequestBody::buffered(Some("application/json"), r#"{"a":1}"#);
        assert!(matches!(body.parse().await.unwrap(), Parsed::Json(_)));

        let mut body = RequestBody::buffered(Some("text/plain"), "hi");
        assert_eq!(body.parse().await.unwrap(), Parsed::Text("hi".to_owned()));

        let mut body = RequestBody::buffered(None, &b"\x00\x01"[..]);
        assert_eq!(body.parse().await.unwrap(), Parsed::Raw(Bytes::from_static(b"\x00\x01")));
    }

    #[tokio::test]
    async fn typed_json_deserialization() {
        #[derive(serde::Deserialize)]
        struct Input {
            name: String,
        }
        let mut body = RequestBody::buffered(Some("application/json"), r#"{"name":"alice"}"#);
        let input: Input = body.json_as().await.unwrap();
        assert_eq!(input.name, "alice");
    }
}
