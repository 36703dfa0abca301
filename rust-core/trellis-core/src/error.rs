//! # Error Handling
//!
//! Centralized error types for Trellis core.
//! Uses `thiserror` for ergonomic error definitions.
//!
//! Two families live here:
//!
//! - [`Error`] covers everything the framework itself can fail at: route
//!   configuration, request parsing, transport.
//! - [`HandlerError`] is what controller handlers return. It wraps any
//!   `std::error::Error` and remembers a short type tag, so the router can
//!   answer with a generic message without leaking the error text.

use std::fmt;
use thiserror::Error;

/// Result type alias for Trellis operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the Trellis runtime
#[derive(Error, Debug)]
pub enum Error {
    /// Server failed to bind to the specified address
    #[error("Failed to bind server to {address}: {source}")]
    BindError {
        /// The address we tried to bind to
        address: String,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Invalid route pattern provided
    #[error("Invalid route pattern: {pattern}: {reason}")]
    InvalidRoutePattern {
        /// The invalid pattern
        pattern: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Placeholder kind outside of the supported set
    #[error("Unsupported placeholder kind '{kind}' in pattern {pattern}")]
    UnsupportedPlaceholderKind {
        /// The pattern containing the placeholder
        pattern: String,
        /// The unknown kind token
        kind: String,
    },

    /// Handler declares a parameter the URL template never captures
    #[error("Handler parameter '{param}' has no placeholder in {method} {pattern}")]
    UnboundHandlerParameter {
        /// HTTP method of the rejected route
        method: String,
        /// Full route pattern
        pattern: String,
        /// The unmatched parameter name
        param: String,
    },

    /// Captured path segment could not be converted to its declared kind
    #[error("Cannot convert '{value}' to {kind} for placeholder '{name}'")]
    Coercion {
        /// Placeholder name
        name: String,
        /// Raw captured value
        value: String,
        /// Target kind name
        kind: &'static str,
    },

    /// HTTP method the router has no routing table for
    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// Request body declared as JSON but failed to parse
    #[error("Malformed JSON body: {0}")]
    MalformedJson(String),

    /// Request body declared as form-encoded but failed to parse
    #[error("Malformed form body: {0}")]
    MalformedForm(#[from] serde_urlencoded::de::Error),

    /// HTTP protocol error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Request payload too large
    #[error("Payload too large: limit={limit} bytes")]
    PayloadTooLarge {
        /// Max allowed size
        limit: usize,
    },
}

impl Error {
    /// Whether this error was caused by the client's input
    ///
    /// Client errors map to `400 Bad Request`; everything else is a
    /// server-side failure.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Coercion { .. } | Self::MalformedJson(_) | Self::MalformedForm(_)
        )
    }
}

/// Error raised by a controller handler
///
/// Anything implementing `std::error::Error` converts into it through `?`.
/// The short type name of the original error is kept as the `type_tag`,
/// which is the only part of the failure a client ever sees.
pub struct HandlerError {
    type_tag: String,
    inner: anyhow::Error,
}

impl HandlerError {
    /// Create a handler error from a message with an explicit type tag
    pub fn msg(type_tag: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            type_tag: type_tag.into(),
            inner: anyhow::anyhow!("{message}"),
        }
    }

    /// The short type name of the underlying error
    #[must_use]
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Full error detail, including the source chain
    #[must_use]
    pub fn detail(&self) -> String {
        format!("{:#}", self.inner)
    }
}

impl<E> From<E> for HandlerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self {
            type_tag: short_type_name::<E>().to_string(),
            inner: anyhow::Error::new(err),
        }
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerError")
            .field("type_tag", &self.type_tag)
            .field("detail", &self.detail())
            .finish()
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_tag, self.inner)
    }
}

/// Last path segment of a type name, generics stripped
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
