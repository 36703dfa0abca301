//! # Route
//!
//! A single `(method, compiled pattern, handler)` binding.
//!
//! A route is built once at registration time and then only read.
//! [`Route::validate`] hands every request its own [`BoundRoute`] carrying
//! the coerced arguments, so concurrent requests on the same route never
//! see each other's values.

use crate::controller::{Handler, HandlerFuture};
use crate::error::{Error, Result};
use crate::pattern::{compile, CompiledPattern, Placeholder};
use crate::request::Request;
use crate::router::Method;
use crate::types::{convert_param, Arguments};
use std::sync::Arc;

/// Registered route
pub struct Route {
    method: Method,
    pattern: CompiledPattern,
    params: Vec<String>,
    handler: Handler,
}

impl Route {
    /// Compile `template` and check the declared handler parameters
    ///
    /// # Errors
    ///
    /// - any pattern compilation error (see [`compile`])
    /// - `Error::UnboundHandlerParameter` when a declared parameter has no
    ///   placeholder in the template
    pub fn new(
        method: Method,
        template: &str,
        params: Vec<String>,
        handler: Handler,
    ) -> Result<Self> {
        let pattern = compile(template)?;

        if let Some(missing) = params
            .iter()
            .find(|p| pattern.kind_of(p.as_str()).is_none())
        {
            return Err(Error::UnboundHandlerParameter {
                method: method.to_string(),
                pattern: template.to_string(),
                param: missing.clone(),
            });
        }

        Ok(Self {
            method,
            pattern,
            params,
            handler,
        })
    }

    /// HTTP method
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Full URL template, including the controller base path
    #[must_use]
    pub fn template(&self) -> &str {
        self.pattern.template()
    }

    /// Placeholders in template order
    #[must_use]
    pub fn placeholders(&self) -> &[Placeholder] {
        self.pattern.placeholders()
    }

    /// Handler parameters declared with the route
    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Whether the URL matches, ignoring coercion
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        self.pattern.is_match(url)
    }

    /// Match `url` and bind its placeholders
    ///
    /// Returns `Ok(None)` when the URL does not match.
    ///
    /// # Errors
    ///
    /// Returns `Error::Coercion` when a captured segment matched the pattern
    /// but does not fit its kind (e.g. an integer beyond `i64`).
    pub fn validate(&self, url: &str) -> Result<Option<BoundRoute<'_>>> {
        let Some(captures) = self.pattern.captures(url) else {
            return Ok(None);
        };

        let mut arguments = Arguments::new();
        for (placeholder, raw) in captures {
            let value = convert_param(&placeholder.name, raw, placeholder.kind)?;
            arguments.insert(placeholder.name.clone(), value);
        }

        Ok(Some(BoundRoute {
            route: self,
            arguments,
        }))
    }

    /// Call the handler without awaiting it
    pub fn invoke(&self, request: Arc<Request>, arguments: Arguments) -> HandlerFuture {
        (self.handler)(request, arguments)
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("template", &self.template())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// A route matched for one request, with that request's arguments
#[derive(Debug)]
pub struct BoundRoute<'r> {
    route: &'r Route,
    arguments: Arguments,
}

impl<'r> BoundRoute<'r> {
    /// The matched route
    #[must_use]
    pub const fn route(&self) -> &'r Route {
        self.route
    }

    /// Arguments bound so far
    #[must_use]
    pub const fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Mutable access for merging body/query/form data
    pub fn arguments_mut(&mut self) -> &mut Arguments {
        &mut self.arguments
    }

    /// Hand the arguments to the handler
    pub fn invoke(self, request: Arc<Request>) -> HandlerFuture {
        self.route.invoke(request, self.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::handler;
    use crate::reply::Reply;
    use crate::types::ParamValue;

    fn echo() -> Handler {
        handler(|_req, args| async move { Ok(serde_json::to_value(&args)?) })
    }

    #[test]
    fn test_validate_binds_typed_argument() {
        let route = Route::new(Method::Get, "/path/<int:x>", vec!["x".into()], echo()).unwrap();
        let bound = route.validate("/path/42").unwrap().unwrap();
        assert_eq!(bound.arguments().get("x"), Some(&ParamValue::Int(42)));
    }

    #[test]
    fn test_validate_no_match() {
        let route = Route::new(Method::Get, "/path/<int:x>", vec![], echo()).unwrap();
        assert!(route.validate("/path/abc").unwrap().is_none());
        assert!(!route.matches("/path/abc"));
    }

    #[test]
    fn test_validate_coercion_failure() {
        let route = Route::new(Method::Get, "/path/<int:x>", vec![], echo()).unwrap();
        let err = route.validate("/path/123456789012345678901234").unwrap_err();
        assert!(matches!(err, Error::Coercion { .. }));
    }

    #[test]
    fn test_bindings_are_per_call() {
        let route = Route::new(Method::Get, "/x/<int:id>", vec![], echo()).unwrap();
        let first = route.validate("/x/1").unwrap().unwrap();
        let second = route.validate("/x/2").unwrap().unwrap();
        assert_eq!(first.arguments().get_int("id"), Some(1));
        assert_eq!(second.arguments().get_int("id"), Some(2));
    }

    #[test]
    fn test_unbound_handler_parameter_rejected() {
        let err = Route::new(Method::Post, "/users/<id>", vec!["user_id".into()], echo())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnboundHandlerParameter { ref param, .. } if param == "user_id"
        ));
    }

    #[test]
    fn test_params_may_be_a_subset() {
        let route = Route::new(Method::Get, "/a/<x>/<y>", vec!["y".into()], echo()).unwrap();
        assert_eq!(route.params(), ["y"]);
        assert_eq!(route.placeholders().len(), 2);
    }

    #[tokio::test]
    async fn test_invoke_passes_arguments() {
        let route = Route::new(Method::Get, "/n/<float:v>", vec!["v".into()], echo()).unwrap();
        let bound = route.validate("/n/2.5").unwrap().unwrap();
        let request = Arc::new(Request::with_method(Method::Get, "/n/2.5"));
        let reply = bound.invoke(request).await.unwrap();
        assert_eq!(reply, Reply::Value(serde_json::json!({"v": 2.5})));
    }
}
