//! Per-request context handed to handlers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use http::{HeaderMap, Method, Uri, header};

use crate::body::RequestBody;
use crate::config::Config;
use crate::cookies;
use crate::response::Response;

/// Everything a handler can see about one request.
///
/// Built by the dispatcher, consumed by the handler, dropped when the
/// handler settles. The request side is immutable; the [`Response`] handle
/// is cloneable and shared with the dispatcher, so writes through
/// [`res`](Context::res) are observable outside the handler.
pub struct Context {
    method: Method,
    path: String,
    headers: HeaderMap,
    query: HashMap<String, String>,
    params: HashMap<String, String>,
    cookies: HashMap<String, String>,
    remote_addr: SocketAddr,
    config: Arc<Config>,
    body: RequestBody,
    res: Response,
}

impl Context {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        method: Method,
        uri: &Uri,
        headers: HeaderMap,
        params: HashMap<String, String>,
        remote_addr: SocketAddr,
        config: Arc<Config>,
        body: RequestBody,
        res: Response,
    ) -> Self {
        let cookies =
            cookies::parse(headers.get(header::COOKIE).and_then(|v| v.to_str().ok()));
        Self {
            method,
            path: uri.path().to_owned(),
            headers,
            query: parse_query(uri.query()),
            params,
            cookies,
            remote_addr,
            config,
            body,
            res,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Case-insensitive header lookup; `None` for absent or non-UTF-8
    /// values.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// A decoded query-string value. Repeated keys keep the last value.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    pub fn query_map(&self) -> &HashMap<String, String> {
        &self.query
    }

    /// A named path parameter.
    ///
    /// For a route `/users/:id`, `ctx.param("id")` on `/users/42` returns
    /// `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// A request cookie by name.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// The application config snapshot.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Sugar for `config().get(key)`.
    pub fn setting(&self, key: &str) -> Option<&toml::Value> {
        self.config.get(key)
    }

    /// The single-shot body accessor.
    pub fn body(&mut self) -> &mut RequestBody {
        &mut self.body
    }

    /// The response handle.
    pub fn res(&self) -> &Response {
        &self.res
    }
}

pub(crate) fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    let Some(query) = query else { return HashMap::new() };
    url::form_urlencoded::parse(query.as_bytes()).into_owned().collect()
}
