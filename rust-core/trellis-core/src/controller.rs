//! # Controllers
//!
//! A controller is anything that can say where it is mounted and which
//! routes it serves. Route declarations are explicit: each one names its
//! methods, its URL template, the placeholder parameters the handler reads,
//! and the handler itself.
//!
//! ```
//! use trellis_core::controller::{handler, Controller, RouteSpec};
//!
//! struct Widgets;
//!
//! impl Controller for Widgets {
//!     fn base_path(&self) -> &str {
//!         "/widgets"
//!     }
//!
//!     fn routes(&self) -> Vec<RouteSpec> {
//!         vec![RouteSpec::get(
//!             "/<int:id>",
//!             handler(|_req, args| async move {
//!                 Ok(format!("widget {}", args.get_int("id").unwrap_or_default()))
//!             }),
//!         )
//!         .params(["id"])]
//!     }
//! }
//! ```

use crate::error::HandlerError;
use crate::reply::Reply;
use crate::request::Request;
use crate::router::Method;
use crate::types::Arguments;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;

/// Future returned by a handler invocation
pub type HandlerFuture = BoxFuture<'static, Result<Reply, HandlerError>>;

/// Handler function type (async)
///
/// Receives the request and the arguments bound for this dispatch.
pub type Handler = Arc<dyn Fn(Arc<Request>, Arguments) -> HandlerFuture + Send + Sync>;

/// Wrap an async closure as a [`Handler`]
///
/// The closure may return anything convertible into a [`Reply`]: text, a
/// JSON value, an object graph, a prebuilt response, or `()`.
pub fn handler<F, Fut, R>(f: F) -> Handler
where
    F: Fn(Arc<Request>, Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    R: Into<Reply>,
{
    Arc::new(
        move |request: Arc<Request>, arguments: Arguments| -> HandlerFuture {
            let fut = f(request, arguments);
            async move { fut.await.map(Into::into) }.boxed()
        },
    )
}

/// Declaration of one route on a controller
#[derive(Clone)]
pub struct RouteSpec {
    pub(crate) methods: Vec<Method>,
    pub(crate) path: String,
    pub(crate) params: Vec<String>,
    pub(crate) handler: Handler,
}

impl RouteSpec {
    /// Declare a route answering several methods
    pub fn new(
        methods: impl IntoIterator<Item = Method>,
        path: impl Into<String>,
        handler: Handler,
    ) -> Self {
        Self {
            methods: methods.into_iter().collect(),
            path: path.into(),
            params: Vec::new(),
            handler,
        }
    }

    /// Declare a GET route
    pub fn get(path: impl Into<String>, handler: Handler) -> Self {
        Self::new([Method::Get], path, handler)
    }

    /// Declare a POST route
    pub fn post(path: impl Into<String>, handler: Handler) -> Self {
        Self::new([Method::Post], path, handler)
    }

    /// Declare a PUT route
    pub fn put(path: impl Into<String>, handler: Handler) -> Self {
        Self::new([Method::Put], path, handler)
    }

    /// Declare a PATCH route
    pub fn patch(path: impl Into<String>, handler: Handler) -> Self {
        Self::new([Method::Patch], path, handler)
    }

    /// Declare a DELETE route
    pub fn delete(path: impl Into<String>, handler: Handler) -> Self {
        Self::new([Method::Delete], path, handler)
    }

    /// Placeholder names the handler reads
    ///
    /// Every name must appear in the URL template, otherwise the route is
    /// rejected at registration.
    #[must_use]
    pub fn params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = names.into_iter().map(Into::into).collect();
        self
    }

    /// Methods this declaration answers
    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// URL template relative to the controller base path
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Debug for RouteSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteSpec")
            .field("methods", &self.methods)
            .field("path", &self.path)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Capability interface for anything that hosts routes
pub trait Controller: Send + Sync {
    /// Mount point of this controller
    fn base_path(&self) -> &str;

    /// Identity used to key this controller's routes
    ///
    /// Defaults to the type name; override it when one type is mounted more
    /// than once.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Route declarations served by this controller
    fn routes(&self) -> Vec<RouteSpec>;
}
