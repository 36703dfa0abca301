//! # Trellis Core
//!
//! Core runtime library for the Trellis framework.
//! Maps HTTP requests onto controller handlers and turns whatever the
//! handlers return into a uniform response envelope.
//!
//! ## Architecture
//!
//! Controllers declare their routes explicitly. At startup each declaration
//! is joined to the controller base path, compiled into an anchored regex
//! and stored in the [`Router`]. Per request, the router matches the
//! sanitized URL, binds typed placeholder arguments for that request only,
//! merges body and query data, runs the handler and normalizes the result.
//!
//! ## Modules
//!
//! - `server` - HTTP server built on Hyper, mounts controllers
//! - `router` - Route registry, lookup and dispatch
//! - `route` - Compiled route and per-request bindings
//! - `pattern` - URL template compiler (`<name>`, `<int:name>`, ...)
//! - `sanitizer` - Path normalization
//! - `controller` - Controller trait, route declarations and handlers
//! - `context` - Per-request dispatch context and argument merging
//! - `request` - HTTP request wrapper with headers and query parsing
//! - `reply` - Handler return values and response-shape inference
//! - `response` - Response envelope and status kinds
//! - `serializer` - Cycle-safe object graph serialization
//! - `json` - JSON body parsing with simd-json
//! - `types` - Placeholder kinds, values and bound arguments
//! - `telemetry` - Tracing subscriber setup
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod context;
pub mod controller;
pub mod error;
pub mod json;
pub mod pattern;
pub mod reply;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod sanitizer;
pub mod serializer;
pub mod server;
pub mod telemetry;
pub mod types;

pub use controller::{handler, Controller, Handler, RouteSpec};
pub use error::{Error, HandlerError, Result};
pub use reply::Reply;
pub use request::Request;
pub use response::{Payload, Response, ResponseKind};
pub use router::{Method, RegistrationReport, Router};
pub use sanitizer::sanitize;
pub use serializer::{Decimal, ObjectGraph};
pub use server::{Server, ServerConfig};
pub use types::{Arguments, ParamType, ParamValue};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
