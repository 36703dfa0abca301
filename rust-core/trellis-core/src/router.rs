//! # Router
//!
//! Route registry and request dispatch.
//!
//! Routes are stored per HTTP method in registration order, keyed by
//! `(full pattern, controller identity)`. Lookup walks that list and the
//! first route whose compiled pattern accepts the sanitized URL wins, so
//! `GET /x/<int:id>` registered before `GET /x/<name>` always takes `/x/42`.
//!
//! Dispatch runs through a fixed sequence:
//!
//! ```text
//! LOOKUP --> FOUND --> EXECUTE --> SUCCESS --> normalized reply
//!   |                     +------> ERROR ----> 500
//!   +------> NOT_IMPLEMENTED (path known under another method) --> 501
//!   +------> NOT_FOUND -----------------------------------------> 404
//! ```
//!
//! Bad input found while preparing arguments ends in 400 before the handler
//! runs. `dispatch` never fails: every outcome is a [`Response`].

use crate::context::DispatchContext;
use crate::controller::Controller;
use crate::error::{Error, HandlerError, Result};
use crate::reply::normalize;
use crate::request::Request;
use crate::response::Response;
use crate::route::{BoundRoute, Route};
use crate::sanitizer::sanitize;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info};

/// HTTP methods supported by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP DELETE
    Delete,
    /// HTTP PATCH
    Patch,
    /// HTTP HEAD
    Head,
    /// HTTP OPTIONS
    Options,
}

impl Method {
    /// Map a hyper method, `None` for methods without a routing table
    #[must_use]
    pub fn from_hyper(method: &hyper::Method) -> Option<Self> {
        match *method {
            hyper::Method::GET => Some(Self::Get),
            hyper::Method::POST => Some(Self::Post),
            hyper::Method::PUT => Some(Self::Put),
            hyper::Method::DELETE => Some(Self::Delete),
            hyper::Method::PATCH => Some(Self::Patch),
            hyper::Method::HEAD => Some(Self::Head),
            hyper::Method::OPTIONS => Some(Self::Options),
            _ => None,
        }
    }

    /// Whether requests with this method carry a parsed body
    #[must_use]
    pub const fn has_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
            Self::Patch => write!(f, "PATCH"),
            Self::Head => write!(f, "HEAD"),
            Self::Options => write!(f, "OPTIONS"),
        }
    }
}

/// Outcome of route lookup
#[derive(Debug)]
pub enum Resolution<'r> {
    /// A route matched under the request's method
    Found(BoundRoute<'r>),
    /// The path matched, but only under other methods
    NotImplemented,
    /// Nothing matched
    NotFound,
}

/// Summary of one controller registration
#[derive(Debug, Default)]
pub struct RegistrationReport {
    /// Routes stored (one per method)
    pub registered: usize,
    /// Declarations rejected, with the reason
    pub skipped: Vec<Error>,
}

impl RegistrationReport {
    /// Whether every declaration was registered
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// One row of the route table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    /// HTTP method
    pub method: Method,
    /// Full URL template
    pub pattern: String,
    /// Owning controller identity
    pub controller: String,
}

struct Registered {
    seq: usize,
    controller: String,
    route: Route,
}

/// Route registry and dispatcher
///
/// Populated once at startup, then shared read-only (e.g. behind an `Arc`)
/// by every in-flight dispatch.
#[derive(Default)]
pub struct Router {
    method_routes: HashMap<Method, Vec<Registered>>,
    next_seq: usize,
}

impl Router {
    /// Create a new empty router
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller (builder pattern)
    #[must_use]
    pub fn with_controller(mut self, controller: &dyn Controller) -> Self {
        self.register(controller);
        self
    }

    /// Install every route a controller declares
    ///
    /// Each route path is joined to the controller base path and sanitized
    /// before compilation. Declarations that fail to compile or declare
    /// parameters without placeholders are skipped and logged; the rest are
    /// stored. A route whose `(method, pattern, controller)` is already
    /// present replaces the earlier one in place.
    pub fn register(&mut self, controller: &dyn Controller) -> RegistrationReport {
        let name = controller.name();
        let base = controller.base_path();
        let mut report = RegistrationReport::default();

        for spec in controller.routes() {
            let template = sanitize([base, spec.path.as_str()]);

            for &method in &spec.methods {
                match Route::new(method, &template, spec.params.clone(), spec.handler.clone()) {
                    Ok(route) => {
                        self.insert(name, route);
                        report.registered += 1;
                    }
                    Err(e) => {
                        error!(
                            controller = %name,
                            method = %method,
                            pattern = %template,
                            error = %e,
                            "Route skipped"
                        );
                        report.skipped.push(e);
                    }
                }
            }
        }

        info!(
            controller = %name,
            registered = report.registered,
            skipped = report.skipped.len(),
            "Controller routes installed"
        );
        report
    }

    fn insert(&mut self, controller: &str, route: Route) {
        let routes = self.method_routes.entry(route.method()).or_default();

        match routes
            .iter_mut()
            .find(|r| r.controller == controller && r.route.template() == route.template())
        {
            Some(existing) => {
                debug!(
                    controller = %controller,
                    method = %route.method(),
                    pattern = %route.template(),
                    "Route overwritten by later registration"
                );
                existing.route = route;
            }
            None => {
                routes.push(Registered {
                    seq: self.next_seq,
                    controller: controller.to_string(),
                    route,
                });
                self.next_seq += 1;
            }
        }
    }

    /// Route table in registration order
    #[must_use]
    pub fn routes(&self) -> Vec<RouteEntry> {
        let mut registered: Vec<&Registered> = self.method_routes.values().flatten().collect();
        registered.sort_by_key(|r| r.seq);
        registered
            .into_iter()
            .map(|r| RouteEntry {
                method: r.route.method(),
                pattern: r.route.template().to_string(),
                controller: r.controller.clone(),
            })
            .collect()
    }

    /// Number of stored routes
    #[must_use]
    pub fn len(&self) -> usize {
        self.method_routes.values().map(Vec::len).sum()
    }

    /// Whether no route is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the route for a sanitized URL
    ///
    /// # Errors
    ///
    /// Returns `Error::Coercion` when the winning route matched but one of
    /// its typed placeholders could not be converted.
    pub fn resolve(&self, method: Method, controller: &str, url: &str) -> Result<Resolution<'_>> {
        let owned = |r: &&Registered| r.controller == controller;

        if let Some(routes) = self.method_routes.get(&method) {
            for registered in routes.iter().filter(owned) {
                if let Some(bound) = registered.route.validate(url)? {
                    return Ok(Resolution::Found(bound));
                }
            }
        }

        let elsewhere = self
            .method_routes
            .iter()
            .filter(|(m, _)| **m != method)
            .flat_map(|(_, routes)| routes.iter().filter(owned))
            .any(|r| r.route.matches(url));

        Ok(if elsewhere {
            Resolution::NotImplemented
        } else {
            Resolution::NotFound
        })
    }

    /// Resolve and run a request against one controller
    ///
    /// Always resolves to a response. Dropping the returned future drops
    /// the handler with it.
    pub async fn dispatch(&self, controller: &dyn Controller, request: Request) -> Response {
        let context = DispatchContext::new(controller, &request);
        let url = context.sanitized_url();

        let mut bound = match self.resolve(context.method(), context.controller(), url) {
            Ok(Resolution::Found(bound)) => bound,
            Ok(Resolution::NotImplemented) => {
                return Response::not_implemented(format!(
                    "{} is not implemented for {url}",
                    context.method()
                ));
            }
            Ok(Resolution::NotFound) => {
                return Response::not_found(format!("no route for {} {url}", context.method()));
            }
            Err(e) => return Response::bad_request(e.to_string()),
        };

        debug!(
            method = %context.method(),
            url = %url,
            route = %bound.route().template(),
            "Route resolved"
        );

        if let Err(e) = context.extract_arguments(&request, bound.arguments_mut()) {
            return Response::bad_request(e.to_string());
        }

        let invocation = bound.invoke(Arc::new(request));
        match AssertUnwindSafe(invocation).catch_unwind().await {
            Ok(Ok(reply)) => normalize(reply),
            Ok(Err(err)) => Response::handler_failure(&err),
            Err(panic) => {
                Response::handler_failure(&HandlerError::msg("Panic", panic_message(&*panic)))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{handler, RouteSpec};
    use crate::response::{ResponseKind, APPLICATION_JSON, TEXT_HTML, TEXT_PLAIN};
    use crate::serializer::{Decimal, ObjectGraph};
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;
    use tracing_test::traced_test;

    struct Shop {
        base: &'static str,
    }

    impl Controller for Shop {
        fn base_path(&self) -> &str {
            self.base
        }

        fn routes(&self) -> Vec<RouteSpec> {
            vec![
                RouteSpec::get(
                    "/x/<int:id>",
                    handler(|_req, args| async move {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Ok(format!("int:{}", args.get_int("id").unwrap_or(-1)))
                    }),
                )
                .params(["id"]),
                RouteSpec::get(
                    "/x/<name>",
                    handler(|_req, args| async move {
                        Ok(format!("name:{}", args.get_str("name").unwrap_or_default()))
                    }),
                )
                .params(["name"]),
                RouteSpec::post(
                    "/widgets",
                    handler(|_req, _args| async move { Ok(Response::created("made")) }),
                ),
                RouteSpec::get(
                    "/page",
                    handler(|_req, _args| async move { Ok("<h1>Hi</h1>") }),
                ),
                RouteSpec::get("/plain", handler(|_req, _args| async move { Ok("Hi") })),
                RouteSpec::get(
                    "/widget",
                    handler(|_req, _args| async move {
                        let mut graph = ObjectGraph::new();
                        let widget = graph.add_object();
                        graph.set(widget, "name", "sprocket");
                        graph.set(widget, "price", Decimal::new(250, 2));
                        Ok(graph)
                    }),
                ),
                RouteSpec::get("/nothing", handler(|_req, _args| async move { Ok(()) })),
                RouteSpec::get(
                    "/explode",
                    handler(|_req, _args| async move {
                        let n: i32 = "twelve".parse()?;
                        Ok(n.to_string())
                    }),
                ),
                RouteSpec::get(
                    "/panic",
                    handler(|_req, _args| async move {
                        let shelves: Vec<u32> = Vec::new();
                        Ok(shelves[3].to_string())
                    }),
                ),
                RouteSpec::put(
                    "/items/<int:id>",
                    handler(|_req, args| async move { Ok(serde_json::to_value(&args)?) }),
                )
                .params(["id"]),
            ]
        }
    }

    fn shop() -> (Router, Shop) {
        let shop = Shop { base: "/" };
        let router = Router::new().with_controller(&shop);
        (router, shop)
    }

    fn get(path: &str) -> Request {
        Request::with_method(Method::Get, path)
    }

    #[test]
    fn test_register_counts_and_table() {
        let shop = Shop { base: "/shop/" };
        let mut router = Router::new();
        let report = router.register(&shop);
        assert!(report.is_clean());
        assert_eq!(report.registered, 10);

        let table = router.routes();
        assert_eq!(table[0].pattern, "/shop/x/<int:id>");
        assert_eq!(table[1].pattern, "/shop/x/<name>");
        assert_eq!(table[2].method, Method::Post);
        assert_eq!(table[2].pattern, "/shop/widgets");
    }

    #[test]
    fn test_register_twice_overwrites() {
        let shop = Shop { base: "/" };
        let mut router = Router::new();
        router.register(&shop);
        let before = router.len();
        router.register(&shop);
        assert_eq!(router.len(), before);
    }

    #[test]
    #[traced_test]
    fn test_bad_declarations_are_skipped() {
        struct Broken;
        impl Controller for Broken {
            fn base_path(&self) -> &str {
                "/broken"
            }
            fn routes(&self) -> Vec<RouteSpec> {
                let ok = handler(|_req, _args| async move { Ok("ok") });
                vec![
                    RouteSpec::get("/a/<uuid:id>", ok.clone()),
                    RouteSpec::get("/b/<id>", ok.clone()).params(["user_id"]),
                    RouteSpec::get("/c", ok),
                ]
            }
        }

        let mut router = Router::new();
        let report = router.register(&Broken);
        assert_eq!(report.registered, 1);
        assert_eq!(report.skipped.len(), 2);
        logs_assert(|lines: &[&str]| {
            let skipped = lines.iter().filter(|l| l.contains("Route skipped"));
            match skipped.filter(|l| l.contains(" ERROR ")).count() {
                2 => Ok(()),
                n => Err(format!("expected two skipped routes at error level, got {n}")),
            }
        });
    }

    #[tokio::test]
    async fn test_typed_coercion() {
        let (router, shop) = shop();
        let resp = router.dispatch(&shop, get("/x/42")).await;
        assert_eq!(resp.payload().as_text(), Some("int:42"));

        let resp = router.dispatch(&shop, get("/x/abc")).await;
        assert_eq!(resp.payload().as_text(), Some("name:abc"));
    }

    #[tokio::test]
    async fn test_non_ascii_digits_fall_through_to_string_route() {
        let (router, shop) = shop();
        let resp = router.dispatch(&shop, get("/x/\u{664}\u{662}")).await;
        assert_eq!(resp.kind(), ResponseKind::Ok);
        assert_eq!(resp.payload().as_text(), Some("name:\u{664}\u{662}"));
    }

    #[tokio::test]
    async fn test_first_registered_wins_consistently() {
        let (router, shop) = shop();
        for _ in 0..5 {
            let resp = router.dispatch(&shop, get("/x/7")).await;
            assert_eq!(resp.payload().as_text(), Some("int:7"));
        }
    }

    #[tokio::test]
    async fn test_method_mismatch_vs_not_found() {
        let (router, shop) = shop();
        let resp = router.dispatch(&shop, get("/widgets")).await;
        assert_eq!(resp.kind(), ResponseKind::NotImplemented);
        assert_eq!(resp.status(), 501);

        let resp = router.dispatch(&shop, get("/unknown")).await;
        assert_eq!(resp.kind(), ResponseKind::NotFound);
    }

    #[tokio::test]
    async fn test_routes_are_scoped_to_controller() {
        struct Renamed(Shop, &'static str);
        impl Controller for Renamed {
            fn base_path(&self) -> &str {
                self.0.base_path()
            }
            fn name(&self) -> &str {
                self.1
            }
            fn routes(&self) -> Vec<RouteSpec> {
                self.0.routes()
            }
        }

        let shop = Shop { base: "/" };
        let outlet = Renamed(Shop { base: "/outlet" }, "outlet");
        let router = Router::new().with_controller(&shop).with_controller(&outlet);

        let resp = router.dispatch(&outlet, get("/plain")).await;
        assert_eq!(resp.payload().as_text(), Some("Hi"));

        // the outlet's table is invisible to the root controller
        let resp = router.dispatch(&shop, get("/outlet/plain")).await;
        assert_eq!(resp.kind(), ResponseKind::NotFound);
    }

    #[tokio::test]
    async fn test_response_shape_inference() {
        let (router, shop) = shop();

        let html = router.dispatch(&shop, get("/page")).await;
        assert_eq!(html.kind(), ResponseKind::Ok);
        assert_eq!(html.content_type(), Some(TEXT_HTML));

        let plain = router.dispatch(&shop, get("/plain")).await;
        assert_eq!(plain.content_type(), Some(TEXT_PLAIN));

        let structured = router.dispatch(&shop, get("/widget")).await;
        assert_eq!(structured.content_type(), Some(APPLICATION_JSON));
        assert_eq!(
            structured.payload().as_json(),
            Some(&json!({"name": "sprocket", "price": "2.5"}))
        );

        let empty = router.dispatch(&shop, get("/nothing")).await;
        assert_eq!(empty.kind(), ResponseKind::NoContent);

        let created = router
            .dispatch(&shop, Request::with_method(Method::Post, "/widgets"))
            .await;
        assert_eq!(created.status(), 201);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_handler_error_is_500_with_one_error_log() {
        let (router, shop) = shop();
        let resp = router.dispatch(&shop, get("/explode")).await;

        assert_eq!(resp.kind(), ResponseKind::InternalServerError);
        assert_eq!(
            resp.payload().as_text(),
            Some("internal server error (ParseIntError)")
        );
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|l| l.contains(" ERROR ")).count() {
                1 => Ok(()),
                n => Err(format!("expected exactly one error line, got {n}")),
            }
        });
    }

    #[tokio::test]
    #[traced_test]
    async fn test_handler_panic_is_500() {
        let (router, shop) = shop();
        let resp = router.dispatch(&shop, get("/panic")).await;
        assert_eq!(resp.status(), 500);
        assert_eq!(resp.payload().as_text(), Some("internal server error (Panic)"));
        assert!(logs_contain("index out of bounds"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_malformed_json_is_400_without_error_log() {
        let (router, shop) = shop();
        let request = Request::with_method(Method::Put, "/items/3")
            .with_body("application/json", "{\"name\": ");
        let resp = router.dispatch(&shop, request).await;

        assert_eq!(resp.kind(), ResponseKind::BadRequest);
        assert_eq!(resp.content_type(), Some(TEXT_PLAIN));
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|l| l.contains(" ERROR ")).count() {
                0 => Ok(()),
                n => Err(format!("expected no error lines, got {n}")),
            }
        });
    }

    #[tokio::test]
    async fn test_coercion_overflow_is_400() {
        let (router, shop) = shop();
        let resp = router
            .dispatch(&shop, get("/x/99999999999999999999999"))
            .await;
        assert_eq!(resp.kind(), ResponseKind::BadRequest);
    }

    #[tokio::test]
    async fn test_body_and_query_merge() {
        let (router, shop) = shop();
        let request = Request::new(
            Method::Put,
            "/items/5?id=999&page=2",
            HashMap::new(),
            None,
        )
        .with_body("application/json", r#"{"id": 1, "name": "bolt"}"#);

        let resp = router.dispatch(&shop, request).await;
        assert_eq!(
            resp.payload().as_json(),
            Some(&json!({"id": 5, "name": "bolt", "page": "2"}))
        );
    }

    #[tokio::test]
    async fn test_form_body_merge() {
        let (router, shop) = shop();
        let request = Request::with_method(Method::Put, "/items/8")
            .with_body("application/x-www-form-urlencoded", "colour=deep+red&id=1");

        let resp = router.dispatch(&shop, request).await;
        assert_eq!(
            resp.payload().as_json(),
            Some(&json!({"id": 8, "colour": "deep red"}))
        );
    }

    #[tokio::test]
    async fn test_concurrent_dispatch_isolation() {
        let (router, shop) = shop();
        let router = Arc::new(router);

        for _ in 0..20 {
            let (one, two) = tokio::join!(
                router.dispatch(&shop, get("/x/1")),
                router.dispatch(&shop, get("/x/2")),
            );
            assert_eq!(one.payload().as_text(), Some("int:1"));
            assert_eq!(two.payload().as_text(), Some("int:2"));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_dispatch_isolation() {
        let shop = Arc::new(Shop { base: "/" });
        let router = Arc::new(Router::new().with_controller(&*shop));

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let router = Arc::clone(&router);
                let shop = Arc::clone(&shop);
                tokio::spawn(async move {
                    let resp = router.dispatch(&*shop, get(&format!("/x/{i}"))).await;
                    (i, resp)
                })
            })
            .collect();

        for task in tasks {
            let (i, resp) = task.await.unwrap();
            assert_eq!(resp.payload().as_text(), Some(format!("int:{i}").as_str()));
        }
    }
}
