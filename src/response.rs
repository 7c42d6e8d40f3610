//! Outgoing response: status, headers, and the append-only output stream.
//!
//! A [`Response`] moves through three states:
//!
//! ```text
//! Open ──(first write / end)──▶ Committed ──(end)──▶ Closed
//! ```
//!
//! While **Open** the status and headers are mutable. The first body write
//! commits: a snapshot of the head goes out over a one-shot channel and the
//! headers freeze — later mutation attempts no-op with a debug diagnostic.
//! **Closed** is terminal; the stream has seen EOF and a second `end()` only
//! logs a warning.
//!
//! The handle is cheaply cloneable: the dispatcher and the detached handler
//! task observe the same underlying state. The transport side holds the
//! [`ResponseReceiver`] — the commit signal fires exactly once, and callers
//! that need full completion must additionally drain the chunk stream.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use http::StatusCode;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::cookies::Cookie;
use crate::error::{ErrorPayload, HttpError};

// ── State machine ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseState {
    /// Nothing sent; status and headers mutable.
    Open,
    /// Head snapshot sent; body streaming.
    Committed,
    /// Stream ended. Terminal.
    Closed,
}

/// Immutable head snapshot carried by the commit signal.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
}

struct Inner {
    state: ResponseState,
    status: StatusCode,
    headers: Vec<(String, String)>,
    head_tx: Option<oneshot::Sender<ResponseHead>>,
    body_tx: Option<mpsc::UnboundedSender<Bytes>>,
}

impl Inner {
    /// Open → Committed. Fires the commit signal exactly once (the sender
    /// is consumed); no-op in any other state.
    fn commit(&mut self) {
        if self.state != ResponseState::Open {
            return;
        }
        self.state = ResponseState::Committed;
        if let Some(tx) = self.head_tx.take() {
            let _ = tx.send(ResponseHead {
                status: self.status,
                headers: self.headers.clone(),
            });
        }
    }

    fn send(&mut self, chunk: Bytes) {
        if let Some(tx) = &self.body_tx {
            // A dropped receiver means the peer is gone; nothing to do.
            let _ = tx.send(chunk);
        }
    }

    fn close(&mut self) {
        self.body_tx = None;
        self.state = ResponseState::Closed;
    }

    fn put_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_ascii_lowercase(), value.to_owned()));
    }

    fn vary(&mut self, name: &str) {
        match self.headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case("vary")) {
            None => self.headers.push(("vary".to_owned(), name.to_owned())),
            Some((_, list)) => {
                if list.trim() == "*" {
                    return;
                }
                if name == "*" {
                    *list = "*".to_owned();
                    return;
                }
                let known = list.split(',').any(|f| f.trim().eq_ignore_ascii_case(name));
                if !known {
                    *list = format!("{list}, {name}");
                }
            }
        }
    }
}

// ── Response handle ───────────────────────────────────────────────────────────

/// An outgoing HTTP response with a streaming body.
///
/// Obtained from the per-request [`Context`](crate::Context). Status
/// defaults to `200 OK`; nothing hits the wire until the first
/// [`write`](Response::write) or [`end`](Response::end).
#[derive(Clone)]
pub struct Response {
    inner: Arc<Mutex<Inner>>,
}

/// Transport-side observables for one response: the one-shot commit signal
/// and the single-consumer chunk stream.
pub struct ResponseReceiver {
    head_rx: oneshot::Receiver<ResponseHead>,
    body_rx: mpsc::UnboundedReceiver<Bytes>,
}

impl ResponseReceiver {
    /// Resolves when the head commits. `None` means every [`Response`]
    /// handle was dropped before committing (e.g. a crashed handler).
    pub async fn committed(&mut self) -> Option<ResponseHead> {
        (&mut self.head_rx).await.ok()
    }

    /// Next body chunk; `None` once the stream is exhausted.
    pub async fn chunk(&mut self) -> Option<Bytes> {
        self.body_rx.recv().await
    }

    pub fn into_body(self) -> mpsc::UnboundedReceiver<Bytes> {
        self.body_rx
    }
}

impl Response {
    /// Creates a response handle plus the transport-side receiver.
    pub fn channel() -> (Self, ResponseReceiver) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::unbounded_channel();
        let inner = Inner {
            state: ResponseState::Open,
            status: StatusCode::OK,
            headers: Vec::new(),
            head_tx: Some(head_tx),
            body_tx: Some(body_tx),
        };
        (
            Self { inner: Arc::new(Mutex::new(inner)) },
            ResponseReceiver { head_rx, body_rx },
        )
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ResponseState {
        self.lock().state
    }

    pub fn status(&self) -> StatusCode {
        self.lock().status
    }

    /// Sets the status code. Accepted any time before Closed; once the head
    /// has committed the change has no wire effect.
    pub fn set_status(&self, status: StatusCode) {
        let mut inner = self.lock();
        if inner.state == ResponseState::Closed {
            debug!(status = status.as_u16(), "status change on closed response ignored");
            return;
        }
        inner.status = status;
    }

    /// Sets `name` to `value`, replacing existing entries. Open state only;
    /// after commit the call no-ops with a diagnostic.
    pub fn set_header(&self, name: &str, value: &str) {
        let mut inner = self.lock();
        if inner.state != ResponseState::Open {
            debug!(header = name, "header mutation after commit ignored");
            return;
        }
        inner.put_header(name, value);
    }

    /// Adds an entry without touching existing ones — multi-value headers
    /// such as `set-cookie`.
    pub fn append_header(&self, name: &str, value: &str) {
        let mut inner = self.lock();
        if inner.state != ResponseState::Open {
            debug!(header = name, "header mutation after commit ignored");
            return;
        }
        inner.headers.push((name.to_ascii_lowercase(), value.to_owned()));
    }

    /// First value of `name`, case-insensitive.
    pub fn header(&self, name: &str) -> Option<String> {
        self.lock()
            .headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    pub fn headers(&self) -> Vec<(String, String)> {
        self.lock().headers.clone()
    }

    /// Appends `name` to the `Vary` list: comma-separated, case-insensitively
    /// de-duplicated. `*` collapses the list and is never extended.
    pub fn vary(&self, name: &str) {
        let mut inner = self.lock();
        if inner.state != ResponseState::Open {
            debug!(header = "vary", "header mutation after commit ignored");
            return;
        }
        inner.vary(name);
    }

    /// Appends an independent `Set-Cookie` entry.
    pub fn set_cookie(&self, cookie: &Cookie) {
        self.append_header("set-cookie", &cookie.to_string());
    }

    // ── Streaming ─────────────────────────────────────────────────────────────

    /// Appends a chunk to the output stream. The first call commits the
    /// head. Text chunks are UTF-8; raw bytes pass through untouched.
    /// Writes on a closed response are dropped with a warning.
    pub fn write(&self, chunk: impl Into<Bytes>) {
        let mut inner = self.lock();
        if inner.state == ResponseState::Closed {
            warn!("write on closed response dropped");
            return;
        }
        inner.commit();
        inner.send(chunk.into());
    }

    /// Ends the stream (EOF). Idempotent: a second call logs a warning and
    /// changes nothing.
    pub fn end(&self) {
        self.finish(None);
    }

    /// Writes a final chunk, then ends the stream.
    pub fn end_with(&self, chunk: impl Into<Bytes>) {
        self.finish(Some(chunk.into()));
    }

    fn finish(&self, chunk: Option<Bytes>) {
        let mut inner = self.lock();
        if inner.state == ResponseState::Closed {
            warn!("end() on closed response ignored");
            return;
        }
        inner.commit();
        if let Some(chunk) = chunk {
            inner.send(chunk);
        }
        inner.close();
    }

    // ── Body sugar ────────────────────────────────────────────────────────────

    /// `text/plain; charset=utf-8` body, then EOF.
    pub fn text(&self, body: impl AsRef<str>) {
        self.set_header("content-type", "text/plain; charset=utf-8");
        self.end_with(Bytes::copy_from_slice(body.as_ref().as_bytes()));
    }

    /// `text/html; charset=utf-8` body, then EOF.
    pub fn html(&self, body: impl AsRef<str>) {
        self.set_header("content-type", "text/html; charset=utf-8");
        self.end_with(Bytes::copy_from_slice(body.as_ref().as_bytes()));
    }

    /// Serializes `value` and ends with an `application/json` body.
    pub fn json<T: Serialize>(&self, value: &T) -> Result<(), HttpError> {
        let bytes = serde_json::to_vec(value)?;
        self.set_header("content-type", "application/json");
        self.end_with(bytes);
        Ok(())
    }

    // ── Assertion helpers ─────────────────────────────────────────────────────

    /// Generic guard. When `cond` holds: finalizes the response with
    /// `status` and the payload (body suppressed for 5xx) and returns the
    /// error so `?` aborts the rest of the handler. When `cond` is false:
    /// `Ok(())`, status untouched.
    pub fn fail_if(
        &self,
        cond: bool,
        status: StatusCode,
        payload: impl Into<ErrorPayload>,
    ) -> Result<(), HttpError> {
        if !cond {
            return Ok(());
        }
        let err = HttpError::new(status, payload);
        self.finalize(&err);
        Err(err)
    }

    /// `400` guard.
    pub fn bad_request(&self, cond: bool, payload: impl Into<ErrorPayload>) -> Result<(), HttpError> {
        self.fail_if(cond, StatusCode::BAD_REQUEST, payload)
    }

    /// `401` guard.
    pub fn unauthorized(&self, cond: bool, payload: impl Into<ErrorPayload>) -> Result<(), HttpError> {
        self.fail_if(cond, StatusCode::UNAUTHORIZED, payload)
    }

    /// `403` guard.
    pub fn forbidden(&self, cond: bool, payload: impl Into<ErrorPayload>) -> Result<(), HttpError> {
        self.fail_if(cond, StatusCode::FORBIDDEN, payload)
    }

    /// `404` guard.
    pub fn not_found(&self, cond: bool, payload: impl Into<ErrorPayload>) -> Result<(), HttpError> {
        self.fail_if(cond, StatusCode::NOT_FOUND, payload)
    }

    /// `409` guard.
    pub fn conflict(&self, cond: bool, payload: impl Into<ErrorPayload>) -> Result<(), HttpError> {
        self.fail_if(cond, StatusCode::CONFLICT, payload)
    }

    /// `410` guard.
    pub fn gone(&self, cond: bool, payload: impl Into<ErrorPayload>) -> Result<(), HttpError> {
        self.fail_if(cond, StatusCode::GONE, payload)
    }

    /// `415` guard.
    pub fn unsupported_media_type(
        &self,
        cond: bool,
        payload: impl Into<ErrorPayload>,
    ) -> Result<(), HttpError> {
        self.fail_if(cond, StatusCode::UNSUPPORTED_MEDIA_TYPE, payload)
    }

    /// Writes `err` out as the response: status plus the tagged payload as
    /// body, suppressed for 5xx. No-op when already Closed — finalization
    /// must never corrupt a stream that has seen EOF.
    pub(crate) fn finalize(&self, err: &HttpError) {
        let mut inner = self.lock();
        if inner.state == ResponseState::Closed {
            return;
        }
        inner.status = err.status;
        if inner.state == ResponseState::Open {
            inner.put_header("content-type", err.payload.content_type());
        }
        inner.commit();
        if !err.status.is_server_error() {
            inner.send(err.payload.to_bytes());
        }
        inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_write_commits_head() {
        let (res, mut rx) = Response::channel();
        res.set_header("x-trace", "abc");
        assert_eq!(res.state(), ResponseState::Open);

        res.write("hello, ");
        assert_eq!(res.state(), ResponseState::Committed);
        res.end_with("world");
        assert_eq!(res.state(), ResponseState::Closed);

        let head = rx.committed().await.unwrap();
        assert_eq!(head.status, StatusCode::OK);
        assert!(head.headers.contains(&("x-trace".to_owned(), "abc".to_owned())));

        assert_eq!(rx.chunk().await.unwrap(), Bytes::from("hello, "));
        assert_eq!(rx.chunk().await.unwrap(), Bytes::from("world"));
        assert!(rx.chunk().await.is_none());
    }

    #[tokio::test]
    async fn end_is_idempotent() {
        let (res, mut rx) = Response::channel();
        res.end();
        res.end(); // warns, no state change
        assert_eq!(res.state(), ResponseState::Closed);
        assert!(rx.committed().await.is_some());
        assert!(rx.chunk().await.is_none());
    }

    #[tokio::test]
    async fn header_mutation_after_commit_is_ignored() {
        let (res, mut rx) = Response::channel();
        res.set_header("x-early", "1");
        res.write("body");
        res.set_header("x-late", "2");
        res.append_header("x-late", "2");

        let head = rx.committed().await.unwrap();
        assert!(head.headers.iter().any(|(n, _)| n == "x-early"));
        assert!(!head.headers.iter().any(|(n, _)| n == "x-late"));
        assert!(!res.headers().iter().any(|(n, _)| n == "x-late"));
    }

    #[tokio::test]
    async fn status_mutation_after_commit_has_no_wire_effect() {
        let (res, mut rx) = Response::channel();
        res.write("x");
        res.set_status(StatusCode::IM_A_TEAPOT);
        let head = rx.committed().await.unwrap();
        assert_eq!(head.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn guard_with_false_condition_is_inert() {
        let (res, _rx) = Response::channel();
        res.bad_request(false, "unused").unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.state(), ResponseState::Open);
    }

    #[tokio::test]
    async fn guard_with_true_condition_finalizes_with_payload() {
        let (res, mut rx) = Response::channel();
        let err = res.not_found(true, "no such user").unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(res.state(), ResponseState::Closed);

        let head = rx.committed().await.unwrap();
        assert_eq!(head.status, StatusCode::NOT_FOUND);
        assert!(head
            .headers
            .contains(&("content-type".to_owned(), "text/plain; charset=utf-8".to_owned())));
        assert_eq!(rx.chunk().await.unwrap(), Bytes::from("no such user"));
        assert!(rx.chunk().await.is_none());
    }

    #[tokio::test]
    async fn server_errors_suppress_the_body() {
        let (res, mut rx) = Response::channel();
        res.fail_if(true, StatusCode::INTERNAL_SERVER_ERROR, "secret detail")
            .unwrap_err();
        let head = rx.committed().await.unwrap();
        assert_eq!(head.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(rx.chunk().await.is_none());
    }

    #[tokio::test]
    async fn json_payload_guard_is_tagged() {
        let (res, mut rx) = Response::channel();
        res.conflict(true, serde_json::json!({"reason": "taken"})).unwrap_err();
        let head = rx.committed().await.unwrap();
        assert!(head
            .headers
            .contains(&("content-type".to_owned(), "application/json".to_owned())));
        assert_eq!(rx.chunk().await.unwrap(), Bytes::from(r#"{"reason":"taken"}"#));
    }

    #[test]
    fn vary_accumulates_and_dedups() {
        let (res, _rx) = Response::channel();
        res.vary("Origin");
        res.vary("Accept-Encoding");
        res.vary("origin");
        assert_eq!(res.header("vary").unwrap(), "Origin, Accept-Encoding");

        res.vary("*");
        assert_eq!(res.header("vary").unwrap(), "*");
        res.vary("Accept");
        assert_eq!(res.header("vary").unwrap(), "*");
    }

    #[test]
    fn two_cookies_two_entries() {
        let (res, _rx) = Response::channel();
        res.set_cookie(&Cookie::new("session", "a"));
        res.set_cookie(&Cookie::new("session", "b"));
        let cookies: Vec<_> =
            res.headers().into_iter().filter(|(n, _)| n == "set-cookie").collect();
        assert_eq!(cookies.len(), 2);
    }

    #[tokio::test]
    async fn json_sugar_sets_content_type() {
        let (res, mut rx) = Response::channel();
        res.json(&serde_json::json!({"id": 1})).unwrap();
        let head = rx.committed().await.unwrap();
        assert!(head
            .headers
            .contains(&("content-type".to_owned(), "application/json".to_owned())));
        assert_eq!(rx.chunk().await.unwrap(), Bytes::from(r#"{"id":1}"#));
    }
}
