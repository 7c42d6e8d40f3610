//! The single failure-interception point.
//!
//! Every handler failure funnels through [`intercept`]: an already-typed
//! [`HttpError`] passes straight through, anything else was converted by a
//! `From` impl on its way out of the handler. 5xx detail stays in the logs
//! and never reaches the client; 4xx payloads are caller-authored and go
//! out verbatim. Finalization is skipped when the response is already
//! Closed — the assertion helpers finalize eagerly, and a closed stream
//! must never be written twice.

use tracing::{debug, error};

use crate::error::HttpError;
use crate::response::{Response, ResponseState};

pub(crate) fn intercept(err: impl Into<HttpError>, res: &Response) {
    let err = err.into();
    if err.status.is_server_error() {
        error!(status = err.status.as_u16(), err = %err, "handler failure");
    } else {
        debug!(status = err.status.as_u16(), err = %err, "request rejected");
    }
    if res.state() == ResponseState::Closed {
        return;
    }
    res.finalize(&err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::StatusCode;

    #[tokio::test]
    async fn client_errors_keep_their_payload() {
        let (res, mut rx) = Response::channel();
        intercept(HttpError::new(StatusCode::NOT_FOUND, "Not Found"), &res);

        let head = rx.committed().await.unwrap();
        assert_eq!(head.status, StatusCode::NOT_FOUND);
        assert_eq!(rx.chunk().await.unwrap(), Bytes::from("Not Found"));
        assert!(rx.chunk().await.is_none());
    }

    #[tokio::test]
    async fn server_errors_send_an_empty_body() {
        let (res, mut rx) = Response::channel();
        intercept(HttpError::internal("connection pool exhausted"), &res);

        let head = rx.committed().await.unwrap();
        assert_eq!(head.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(rx.chunk().await.is_none());
    }

    #[tokio::test]
    async fn foreign_failures_are_normalized() {
        let (res, mut rx) = Response::channel();
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        intercept(io, &res);
        assert_eq!(rx.committed().await.unwrap().status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn closed_responses_are_left_alone() {
        let (res, mut rx) = Response::channel();
        // An assertion helper already finalized this response.
        res.bad_request(true, "missing field").unwrap_err();
        intercept(HttpError::internal("late failure"), &res);

        // The eager finalization is what the client sees.
        let head = rx.committed().await.unwrap();
        assert_eq!(head.status, StatusCode::BAD_REQUEST);
        assert_eq!(rx.chunk().await.unwrap(), Bytes::from("missing field"));
        assert!(rx.chunk().await.is_none());
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
