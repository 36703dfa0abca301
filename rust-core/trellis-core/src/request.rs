//! # HTTP Request
//!
//! Request wrapper handed to the router and to handlers.
//!
//! Besides the usual method/headers/body, a request knows its residual path:
//! the segments left over once the transport has matched the controller
//! mount point. Routing only ever looks at `controller base path + residual`.

use crate::error::{Error, Result};
use crate::router::Method;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use std::collections::HashMap;

/// HTTP request as seen by the dispatch engine
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Request path (without query string)
    pub path: String,
    /// Path segments after the controller mount point
    postpath: Vec<String>,
    /// Raw query string (e.g., "page=1&limit=10")
    query_string: Option<String>,
    /// Parsed query parameters
    query_params: HashMap<String, String>,
    /// Request headers
    headers: HeaderMap,
    /// Request body (collected)
    body: Option<Bytes>,
}

impl Request {
    /// Create a request manually (for testing/internal use)
    ///
    /// `path` may carry a query string. The whole path is treated as
    /// residual until [`Request::strip_mount`] is called.
    pub fn new(
        method: Method,
        path: impl Into<String>,
        headers_map: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Self {
        let path = path.into();
        let (path, query_string) = match path.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (path, None),
        };

        let mut headers = HeaderMap::new();
        for (k, v) in headers_map {
            if let (Ok(n), Ok(v)) = (
                HeaderName::from_bytes(k.as_bytes()),
                HeaderValue::from_str(&v),
            ) {
                headers.insert(n, v);
            }
        }

        Self::assemble(method, path, query_string, headers, body)
    }

    /// Shorthand for a body-less request
    pub fn with_method(method: Method, path: impl Into<String>) -> Self {
        Self::new(method, path, HashMap::new(), None)
    }

    /// Attach a body and its content type
    #[must_use]
    pub fn with_body(mut self, content_type: &str, body: impl Into<Bytes>) -> Self {
        self.set_header(CONTENT_TYPE.as_str(), content_type);
        self.body = Some(body.into());
        self
    }

    /// Create from hyper request with body size limit
    ///
    /// # Errors
    ///
    /// - `Error::UnsupportedMethod` for methods outside [`Method`]
    /// - `Error::PayloadTooLarge` when the body exceeds `max_body_size`
    /// - `Error::Http` when the body stream fails
    pub async fn from_hyper_with_limit(
        req: hyper::Request<hyper::body::Incoming>,
        max_body_size: usize,
    ) -> Result<Self> {
        let method = Method::from_hyper(req.method())
            .ok_or_else(|| Error::UnsupportedMethod(req.method().to_string()))?;

        let uri = req.uri();
        let path = uri.path().to_string();
        let query_string = uri.query().map(String::from);

        let headers = req.headers().clone();
        let declared = headers
            .get(CONTENT_LENGTH)
            .and_then(|len| len.to_str().ok())
            .and_then(|len| len.parse::<usize>().ok());
        if let Some(content_len) = declared {
            if content_len > max_body_size {
                return Err(Error::PayloadTooLarge {
                    limit: max_body_size,
                });
            }
        }

        // chunked bodies carry no length, so the limit is enforced per frame
        let bytes = Limited::new(req.into_body(), max_body_size)
            .collect()
            .await
            .map_err(|e| body_error(e, max_body_size))?
            .to_bytes();
        let body = (!bytes.is_empty()).then_some(bytes);

        Ok(Self::assemble(method, path, query_string, headers, body))
    }

    fn assemble(
        method: Method,
        path: String,
        query_string: Option<String>,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Self {
        let query_params = parse_query_string(query_string.as_deref());
        let postpath = split_segments(&path);

        Self {
            method,
            path,
            postpath,
            query_string,
            query_params,
            headers,
            body,
        }
    }

    /// Consume the mount point from the front of the path
    ///
    /// Returns `false` (and leaves the request untouched) when `mount` is not
    /// a segment-wise prefix of the path.
    pub fn strip_mount(&mut self, mount: &str) -> bool {
        let full = split_segments(&self.path);
        let prefix = split_segments(mount);
        if !full.starts_with(&prefix) {
            return false;
        }
        self.postpath = full[prefix.len()..].to_vec();
        true
    }

    /// Path segments after the controller mount point
    #[must_use]
    pub fn postpath(&self) -> &[String] {
        &self.postpath
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set or override a header
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(n, v);
        }
    }

    /// Media type of the body, parameters stripped and lowercased
    #[must_use]
    pub fn content_type(&self) -> Option<String> {
        self.header(CONTENT_TYPE.as_str()).map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    /// Get query parameters as a HashMap
    #[must_use]
    pub const fn query_map(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    /// Get raw query string
    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    /// Get the request body as bytes
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Get the request body as string (UTF-8)
    #[must_use]
    pub fn body_str(&self) -> Option<&str> {
        self.body_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }
}

fn body_error(err: Box<dyn std::error::Error + Send + Sync>, limit: usize) -> Error {
    if err.is::<LengthLimitError>() {
        return Error::PayloadTooLarge { limit };
    }
    match err.downcast::<hyper::Error>() {
        Ok(e) => Error::Http(*e),
        Err(other) => Error::Io(std::io::Error::new(std::io::ErrorKind::Other, other)),
    }
}

fn split_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parse query string into HashMap
///
/// Handles URL decoding; duplicate keys keep the last value. A malformed
/// query string yields no parameters.
fn parse_query_string(query: Option<&str>) -> HashMap<String, String> {
    query
        .and_then(|q| serde_urlencoded::from_str::<Vec<(String, String)>>(q).ok())
        .map(|pairs| pairs.into_iter().collect())
        .unwrap_or_default()
}
