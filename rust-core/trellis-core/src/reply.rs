//! # Handler Replies
//!
//! What a handler hands back, and how it becomes a [`Response`].
//!
//! | reply                      | response                                   |
//! |----------------------------|--------------------------------------------|
//! | nothing (`()`, `None`)     | `204 No Content`                           |
//! | text that looks like markup| `200`, `text/html`                         |
//! | any other text             | `200`, `text/plain`                        |
//! | JSON value / object graph  | `200`, `application/json`, serialized      |
//! | a `Response`               | as is; object graphs serialized if JSON    |

use crate::error::HandlerError;
use crate::response::{Payload, Response};
use crate::serializer::ObjectGraph;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;

/// Raw value produced by a handler
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// No result
    Empty,
    /// Text, classified as HTML or plain text
    Text(String),
    /// Structured value
    Value(Value),
    /// Linked objects to be flattened
    Object(ObjectGraph),
    /// Prebuilt envelope
    Response(Response),
}

impl Reply {
    /// Serialize any `serde` value into a structured reply
    ///
    /// # Errors
    ///
    /// Fails when `value` cannot be represented as JSON (e.g. a map with
    /// non-string keys).
    pub fn structured<T: Serialize>(value: &T) -> Result<Self, HandlerError> {
        Ok(Self::Value(serde_json::to_value(value)?))
    }
}

impl From<()> for Reply {
    fn from((): ()) -> Self {
        Self::Empty
    }
}

impl From<&str> for Reply {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Reply {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Value> for Reply {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<ObjectGraph> for Reply {
    fn from(g: ObjectGraph) -> Self {
        Self::Object(g)
    }
}

impl From<Response> for Reply {
    fn from(r: Response) -> Self {
        Self::Response(r)
    }
}

impl<T: Into<Self>> From<Option<T>> for Reply {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Empty, Into::into)
    }
}

/// Whether a string contains something shaped like a markup tag
#[must_use]
pub fn looks_like_markup(text: &str) -> bool {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| {
        Regex::new(r"<\s*[A-Za-z!/?][^<>]*>").expect("markup tag regex is valid")
    })
    .is_match(text)
}

/// Turn a handler reply into the final envelope
#[must_use]
pub fn normalize(reply: Reply) -> Response {
    match reply {
        Reply::Empty => Response::no_content(),
        Reply::Text(text) if looks_like_markup(&text) => Response::html(text),
        Reply::Text(text) => Response::text(text),
        Reply::Value(value) => Response::json(value),
        Reply::Object(graph) => Response::json(Payload::Json(graph.to_value())),
        Reply::Response(mut response) => {
            response.serialize_payload();
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{ResponseKind, APPLICATION_JSON, TEXT_HTML, TEXT_PLAIN};
    use serde_json::json;

    #[test]
    fn test_markup_detection() {
        assert!(looks_like_markup("<h1>Hi</h1>"));
        assert!(looks_like_markup("<!DOCTYPE html><p>x</p>"));
        assert!(looks_like_markup("see <br/> here"));
        assert!(!looks_like_markup("Hi"));
        assert!(!looks_like_markup("1 < 2 and 3 > 2"));
    }

    #[test]
    fn test_html_string() {
        let resp = normalize("<h1>Hi</h1>".into());
        assert_eq!(resp.kind(), ResponseKind::Ok);
        assert_eq!(resp.content_type(), Some(TEXT_HTML));
    }

    #[test]
    fn test_plain_string() {
        let resp = normalize("Hi".into());
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.content_type(), Some(TEXT_PLAIN));
        assert_eq!(resp.payload().as_text(), Some("Hi"));
    }

    #[test]
    fn test_structured_value() {
        #[derive(Serialize)]
        struct Widget {
            id: i64,
            tags: Vec<&'static str>,
        }

        let reply = Reply::structured(&Widget {
            id: 4,
            tags: vec!["blue"],
        })
        .unwrap();
        let resp = normalize(reply);
        assert_eq!(resp.content_type(), Some(APPLICATION_JSON));
        assert_eq!(resp.payload().as_json(), Some(&json!({"id": 4, "tags": ["blue"]})));
    }

    #[test]
    fn test_object_graph() {
        let mut graph = ObjectGraph::new();
        let root = graph.add_object();
        graph.set(root, "name", "gear");
        let resp = normalize(graph.into());
        assert_eq!(resp.content_type(), Some(APPLICATION_JSON));
        assert_eq!(resp.payload().as_json(), Some(&json!({"name": "gear"})));
    }

    #[test]
    fn test_empty_is_no_content() {
        assert_eq!(normalize(().into()).kind(), ResponseKind::NoContent);
        assert_eq!(normalize(None::<String>.into()).kind(), ResponseKind::NoContent);
    }

    #[test]
    fn test_envelope_passthrough() {
        let resp = normalize(Response::created("made").into());
        assert_eq!(resp.status(), 201);
        assert_eq!(resp.payload().as_text(), Some("made"));
        assert_eq!(resp.content_type(), None);
    }

    #[test]
    fn test_json_envelope_graph_is_serialized() {
        let mut graph = ObjectGraph::new();
        let root = graph.add_object();
        graph.set(root, "id", 9);
        let envelope = Response::conflict(graph).with_header("Content-Type", APPLICATION_JSON);
        let resp = normalize(envelope.into());
        assert_eq!(resp.status(), 409);
        assert_eq!(resp.payload().as_json(), Some(&json!({"id": 9})));
    }
}
