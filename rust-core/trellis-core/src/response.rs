//! # Response Envelope
//!
//! The normalized `(status, payload, headers)` value every dispatch resolves
//! to. The transport layer turns it into bytes on the wire.
//!
//! Constructing an envelope is observable: `BadRequest` and `NotFound` log a
//! warning, every 5xx kind logs an error, the rest are silent.

use crate::error::{HandlerError, Result};
use crate::serializer::ObjectGraph;
use hyper::body::Bytes;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{error, warn};

/// `text/plain` content type
pub const TEXT_PLAIN: &str = "text/plain";
/// `text/html` content type
pub const TEXT_HTML: &str = "text/html";
/// `application/json` content type
pub const APPLICATION_JSON: &str = "application/json";

/// Response variants and their status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    /// 200
    Ok,
    /// 201
    Created,
    /// 204, produced for handlers that return nothing
    NoContent,
    /// 302 redirect
    Found,
    /// 400
    BadRequest,
    /// 401
    Unauthorized,
    /// 404
    NotFound,
    /// 409
    Conflict,
    /// 409, a conflict caused by an existing resource
    AlreadyExists,
    /// 500
    InternalServerError,
    /// 501, the path exists but not for this method
    NotImplemented,
}

impl ResponseKind {
    /// Numeric status code
    #[must_use]
    pub const fn status(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Created => 201,
            Self::NoContent => 204,
            Self::Found => 302,
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::NotFound => 404,
            Self::Conflict | Self::AlreadyExists => 409,
            Self::InternalServerError => 500,
            Self::NotImplemented => 501,
        }
    }

    /// Whether this kind is a conflict (including `AlreadyExists`)
    #[must_use]
    pub const fn is_conflict(self) -> bool {
        matches!(self, Self::Conflict | Self::AlreadyExists)
    }

    /// Whether this kind is a server error
    #[must_use]
    pub const fn is_server_error(self) -> bool {
        self.status() >= 500
    }
}

/// Response body before wire encoding
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// No body
    Empty,
    /// UTF-8 text (plain or markup)
    Text(String),
    /// Raw bytes
    Bytes(Bytes),
    /// Serialized structure
    Json(Value),
    /// Object graph awaiting serialization
    Object(ObjectGraph),
}

impl Payload {
    /// Borrow as text if this is a text payload
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as JSON if this is a serialized payload
    #[must_use]
    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Encode for the wire
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if a JSON payload cannot be encoded.
    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(match self {
            Self::Empty => Bytes::new(),
            Self::Text(s) => Bytes::from(s.clone()),
            Self::Bytes(b) => b.clone(),
            Self::Json(v) => Bytes::from(serde_json::to_vec(v)?),
            Self::Object(graph) => Bytes::from(serde_json::to_vec(&graph.to_value())?),
        })
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Value> for Payload {
    fn from(v: Value) -> Self {
        Self::Json(v)
    }
}

impl From<ObjectGraph> for Payload {
    fn from(g: ObjectGraph) -> Self {
        Self::Object(g)
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Self::Bytes(b)
    }
}

/// Response envelope
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    kind: ResponseKind,
    payload: Payload,
    headers: HashMap<String, String>,
}

impl Response {
    /// Create a response of the given kind
    ///
    /// Header names are stored lowercase.
    pub fn new(kind: ResponseKind, payload: impl Into<Payload>) -> Self {
        Self::build(kind, payload.into(), None)
    }

    /// 200 with a payload
    pub fn ok(payload: impl Into<Payload>) -> Self {
        Self::new(ResponseKind::Ok, payload)
    }

    /// 200 with a `text/plain` body
    pub fn text(body: impl Into<String>) -> Self {
        Self::ok(body.into()).with_header("content-type", TEXT_PLAIN)
    }

    /// 200 with a `text/html` body
    pub fn html(body: impl Into<String>) -> Self {
        Self::ok(body.into()).with_header("content-type", TEXT_HTML)
    }

    /// 200 with an `application/json` body
    pub fn json(payload: impl Into<Payload>) -> Self {
        Self::ok(payload).with_header("content-type", APPLICATION_JSON)
    }

    /// 201 with a payload
    pub fn created(payload: impl Into<Payload>) -> Self {
        Self::new(ResponseKind::Created, payload)
    }

    /// 204 without a body
    #[must_use]
    pub fn no_content() -> Self {
        Self::new(ResponseKind::NoContent, Payload::Empty)
    }

    /// 302 redirect to `location`
    #[must_use]
    pub fn found(location: &str) -> Self {
        Self::new(ResponseKind::Found, Payload::Empty).with_header("location", location)
    }

    /// 400 with a plain-text description
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ResponseKind::BadRequest, message.into()).with_header("content-type", TEXT_PLAIN)
    }

    /// 401 with a plain-text description
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ResponseKind::Unauthorized, message.into())
            .with_header("content-type", TEXT_PLAIN)
    }

    /// 404 with a plain-text description
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ResponseKind::NotFound, message.into()).with_header("content-type", TEXT_PLAIN)
    }

    /// 409 with a payload
    pub fn conflict(payload: impl Into<Payload>) -> Self {
        Self::new(ResponseKind::Conflict, payload)
    }

    /// 409 for a resource that already exists
    pub fn already_exists(payload: impl Into<Payload>) -> Self {
        Self::new(ResponseKind::AlreadyExists, payload)
    }

    /// 500 with a plain-text description
    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(ResponseKind::InternalServerError, message.into())
            .with_header("content-type", TEXT_PLAIN)
    }

    /// 500 for a failed handler
    ///
    /// The full error detail goes to the log; the client body only carries a
    /// generic message and the error's type tag.
    #[must_use]
    pub fn handler_failure(err: &HandlerError) -> Self {
        let message = format!("internal server error ({})", err.type_tag());
        Self::build(
            ResponseKind::InternalServerError,
            Payload::Text(message),
            Some(&err.detail()),
        )
        .with_header("content-type", TEXT_PLAIN)
    }

    /// 501 with a plain-text description
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(ResponseKind::NotImplemented, message.into())
            .with_header("content-type", TEXT_PLAIN)
    }

    fn build(kind: ResponseKind, payload: Payload, detail: Option<&str>) -> Self {
        let status = kind.status();
        let summary = payload.as_text().unwrap_or_default();
        match kind {
            ResponseKind::BadRequest | ResponseKind::NotFound => {
                warn!(status, kind = ?kind, message = %summary, "client request rejected");
            }
            k if k.is_server_error() => match detail {
                Some(detail) => error!(
                    status,
                    kind = ?kind,
                    message = %summary,
                    detail = %detail,
                    "server failure"
                ),
                None => error!(status, kind = ?kind, message = %summary, "server failure"),
            },
            _ => {}
        }

        Self {
            kind,
            payload,
            headers: HashMap::new(),
        }
    }

    /// Response variant
    #[must_use]
    pub const fn kind(&self) -> ResponseKind {
        self.kind
    }

    /// Numeric status code
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.kind.status()
    }

    /// Response payload
    #[must_use]
    pub const fn payload(&self) -> &Payload {
        &self.payload
    }

    /// All headers (lowercase names)
    #[must_use]
    pub const fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Declared content type
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Whether the declared content type is JSON
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.starts_with(APPLICATION_JSON))
    }

    /// Set header (builder pattern)
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.set_header(key, value);
        self
    }

    /// Set or override a header
    pub fn set_header(&mut self, key: &str, value: &str) {
        self.headers
            .insert(key.to_ascii_lowercase(), value.to_string());
    }

    /// Serialize an object-graph payload in place
    ///
    /// Only JSON-typed envelopes are rewritten; this is the single payload
    /// mutation an envelope goes through.
    pub(crate) fn serialize_payload(&mut self) {
        if !self.is_json() {
            return;
        }
        if let Payload::Object(graph) = &self.payload {
            self.payload = Payload::Json(graph.to_value());
        }
    }
}
