//! # Dispatch Context
//!
//! Per-request view used by the router: the sanitized URL to match, the
//! method, and the owning controller. Also merges body and query data into
//! the arguments bound from the path.
//!
//! Merge precedence is path > body > query; a name already bound is never
//! overwritten.

use crate::controller::Controller;
use crate::error::Result;
use crate::json::parse_json_body;
use crate::request::Request;
use crate::router::Method;
use crate::sanitizer::sanitize;
use crate::types::{Arguments, ParamValue};
use serde_json::Value;
use tracing::debug;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Routing view of one request
#[derive(Debug, Clone)]
pub struct DispatchContext {
    sanitized_url: String,
    method: Method,
    controller: String,
}

impl DispatchContext {
    /// Build the context for `request` arriving at `controller`
    ///
    /// The URL matched against the routes is the controller base path joined
    /// with the request's residual path, then sanitized.
    pub fn new(controller: &dyn Controller, request: &Request) -> Self {
        let base = controller.base_path();
        let sanitized_url = sanitize(
            std::iter::once(base).chain(request.postpath().iter().map(String::as_str)),
        );

        Self {
            sanitized_url,
            method: request.method,
            controller: controller.name().to_string(),
        }
    }

    /// URL used for matching
    #[must_use]
    pub fn sanitized_url(&self) -> &str {
        &self.sanitized_url
    }

    /// Request method
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Controller identity
    #[must_use]
    pub fn controller(&self) -> &str {
        &self.controller
    }

    /// Merge body and query parameters into `arguments`
    ///
    /// Bodies are read only for POST, PUT and PATCH. A JSON body contributes
    /// its top-level members when it is an object; any other JSON value, or
    /// an empty body, contributes nothing.
    ///
    /// # Errors
    ///
    /// `Error::MalformedJson` or `Error::MalformedForm` when the body does
    /// not parse as its declared content type.
    pub fn extract_arguments(&self, request: &Request, arguments: &mut Arguments) -> Result<()> {
        if self.method.has_body() {
            if let Some(body) = request.body_bytes().filter(|b| !b.is_empty()) {
                match request.content_type().as_deref() {
                    Some(ct) if is_json(ct) => merge_json(body, arguments)?,
                    Some(FORM_URLENCODED) => merge_form(body, arguments)?,
                    _ => {}
                }
            }
        }

        for (name, value) in request.query_map() {
            arguments.insert_if_absent(name.as_str(), ParamValue::String(value.clone()));
        }

        Ok(())
    }
}

fn is_json(content_type: &str) -> bool {
    content_type == "application/json" || content_type.ends_with("+json")
}

fn merge_json(body: &[u8], arguments: &mut Arguments) -> Result<()> {
    match parse_json_body::<Value>(body)? {
        Value::Object(members) => {
            for (name, value) in members {
                arguments.insert_if_absent(name, ParamValue::from_json(value));
            }
        }
        other => debug!(kind = json_kind(&other), "Non-object JSON body not merged"),
    }
    Ok(())
}

fn merge_form(body: &[u8], arguments: &mut Arguments) -> Result<()> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)?;
    for (name, value) in pairs {
        arguments.insert_if_absent(name, ParamValue::String(value));
    }
    Ok(())
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::RouteSpec;
    use crate::error::Error;
    use serde_json::json;

    struct Inventory;

    impl Controller for Inventory {
        fn base_path(&self) -> &str {
            "//inventory/"
        }

        fn name(&self) -> &str {
            "inventory"
        }

        fn routes(&self) -> Vec<RouteSpec> {
            Vec::new()
        }
    }

    fn context_for(request: &Request) -> DispatchContext {
        DispatchContext::new(&Inventory, request)
    }

    #[test]
    fn test_sanitized_url_joins_base_and_residual() {
        let mut request = Request::with_method(Method::Get, "/store//inventory/items/4/");
        assert!(request.strip_mount("/store"));
        let ctx = context_for(&request);
        assert_eq!(ctx.sanitized_url(), "/inventory/inventory/items/4");
        assert_eq!(ctx.method(), Method::Get);
        assert_eq!(ctx.controller(), "inventory");
    }

    #[test]
    fn test_root_residual() {
        let request = Request::with_method(Method::Get, "/");
        assert_eq!(context_for(&request).sanitized_url(), "/inventory");
    }

    #[test]
    fn test_json_object_merged_without_overwrite() {
        let request = Request::with_method(Method::Post, "/")
            .with_body("application/json", r#"{"id": 1, "tags": ["a"], "name": "bolt"}"#);
        let mut args = Arguments::new();
        args.insert("id", ParamValue::Int(9));

        context_for(&request)
            .extract_arguments(&request, &mut args)
            .unwrap();
        assert_eq!(args.get_int("id"), Some(9));
        assert_eq!(args.get_str("name"), Some("bolt"));
        assert_eq!(args.get("tags"), Some(&ParamValue::Json(json!(["a"]))));
    }

    #[test]
    fn test_vendor_json_content_type() {
        let request = Request::with_method(Method::Patch, "/")
            .with_body("application/merge-patch+json", r#"{"qty": 3}"#);
        let mut args = Arguments::new();
        context_for(&request)
            .extract_arguments(&request, &mut args)
            .unwrap();
        assert_eq!(args.get("qty"), Some(&ParamValue::Json(json!(3))));
    }

    #[test]
    fn test_non_object_json_ignored() {
        let request =
            Request::with_method(Method::Put, "/").with_body("application/json", "[1, 2]");
        let mut args = Arguments::new();
        context_for(&request)
            .extract_arguments(&request, &mut args)
            .unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn test_empty_json_body_ignored() {
        let request = Request::with_method(Method::Put, "/").with_body("application/json", "");
        let mut args = Arguments::new();
        assert!(context_for(&request)
            .extract_arguments(&request, &mut args)
            .is_ok());
    }

    #[test]
    fn test_malformed_json_is_client_error() {
        let request =
            Request::with_method(Method::Put, "/").with_body("application/json", "{\"a\":");
        let err = context_for(&request)
            .extract_arguments(&request, &mut Arguments::new())
            .unwrap_err();
        assert!(matches!(err, Error::MalformedJson(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_body_ignored_for_get() {
        let request = Request::with_method(Method::Get, "/?page=2")
            .with_body("application/json", "not even json");
        let mut args = Arguments::new();
        context_for(&request)
            .extract_arguments(&request, &mut args)
            .unwrap();
        assert_eq!(args.get_str("page"), Some("2"));
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn test_body_wins_over_query() {
        let request = Request::with_method(Method::Post, "/?name=query&sort=asc")
            .with_body(FORM_URLENCODED, "name=form+value");
        let mut args = Arguments::new();
        context_for(&request)
            .extract_arguments(&request, &mut args)
            .unwrap();
        assert_eq!(args.get_str("name"), Some("form value"));
        assert_eq!(args.get_str("sort"), Some("asc"));
    }
}
