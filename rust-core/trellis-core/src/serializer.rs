//! # Object Serializer
//!
//! Handlers that build linked records (an order pointing at its customer,
//! the customer pointing back at its orders) describe them as an
//! [`ObjectGraph`]: an arena of object and list nodes addressed by id.
//! Serialization flattens the graph reachable from the root into a JSON map.
//!
//! Nodes are tracked on the current traversal path only. A node shared by
//! two siblings is rendered twice; a node that refers back to one of its own
//! ancestors is rendered as `null`.

use serde_json::{Map, Number, Value};
use std::fmt;
use tracing::debug;

/// Handle to an object node in an [`ObjectGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(usize);

/// Handle to a list node in an [`ObjectGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListId(usize);

/// Fixed-point decimal, `units / 10^scale`
///
/// Rendered as a floating-point string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimal {
    units: i128,
    scale: u32,
}

impl Decimal {
    /// Create a decimal from integer units and a base-10 scale
    ///
    /// `Decimal::new(1999, 2)` is `19.99`.
    #[must_use]
    pub const fn new(units: i128, scale: u32) -> Self {
        Self { units, scale }
    }

    /// Nearest `f64`
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    pub fn to_f64(self) -> f64 {
        self.units as f64 / 10f64.powi(self.scale as i32)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

/// Attribute or list element value
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Absent value
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// Fixed-point decimal
    Decimal(Decimal),
    /// Text
    Text(String),
    /// Nested object
    Object(ObjectId),
    /// Nested list
    List(ListId),
}

impl From<bool> for Field {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Field {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Field {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Field {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Decimal> for Field {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<&str> for Field {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Field {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<ObjectId> for Field {
    fn from(v: ObjectId) -> Self {
        Self::Object(v)
    }
}

impl From<ListId> for Field {
    fn from(v: ListId) -> Self {
        Self::List(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Field {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Object(Vec<(String, Field)>),
    List(Vec<Field>),
}

/// Arena of linked objects with a designated root
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectGraph {
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl ObjectGraph {
    /// Create an empty graph
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty object; the first object added becomes the root
    pub fn add_object(&mut self) -> ObjectId {
        let id = self.push_node(Node::Object(Vec::new()));
        ObjectId(id)
    }

    /// Add an empty list
    pub fn add_list(&mut self) -> ListId {
        ListId(self.push_node(Node::List(Vec::new())))
    }

    /// Make `id` the root of serialization
    pub fn set_root(&mut self, id: ObjectId) {
        self.root = Some(id.0);
    }

    /// Set an attribute, replacing a previous value under the same key
    pub fn set(&mut self, object: ObjectId, key: impl Into<String>, value: impl Into<Field>) {
        if let Some(Node::Object(fields)) = self.nodes.get_mut(object.0) {
            let key = key.into();
            let value = value.into();
            match fields.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => fields.push((key, value)),
            }
        }
    }

    /// Append an element to a list
    pub fn push(&mut self, list: ListId, value: impl Into<Field>) {
        if let Some(Node::List(items)) = self.nodes.get_mut(list.0) {
            items.push(value.into());
        }
    }

    /// Flatten the graph reachable from the root into JSON
    ///
    /// An empty graph serializes to `null`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut ancestors = Vec::new();
        self.root
            .map_or(Value::Null, |root| self.render_node(root, &mut ancestors))
    }

    fn push_node(&mut self, node: Node) -> usize {
        let id = self.nodes.len();
        let is_object = matches!(node, Node::Object(_));
        self.nodes.push(node);
        if self.root.is_none() && is_object {
            self.root = Some(id);
        }
        id
    }

    fn render_node(&self, id: usize, ancestors: &mut Vec<usize>) -> Value {
        if ancestors.contains(&id) {
            debug!(node = id, "cyclic reference truncated during serialization");
            return Value::Null;
        }
        let Some(node) = self.nodes.get(id) else {
            return Value::Null;
        };

        ancestors.push(id);
        let value = match node {
            Node::Object(fields) => {
                let mut map = Map::with_capacity(fields.len());
                for (key, field) in fields {
                    map.insert(key.clone(), self.render_field(field, ancestors));
                }
                Value::Object(map)
            }
            Node::List(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.render_field(item, ancestors))
                    .collect(),
            ),
        };
        ancestors.pop();
        value
    }

    fn render_field(&self, field: &Field, ancestors: &mut Vec<usize>) -> Value {
        match field {
            Field::Null => Value::Null,
            Field::Bool(b) => Value::Bool(*b),
            Field::Int(i) => Value::Number((*i).into()),
            Field::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Field::Decimal(d) => Value::String(d.to_string()),
            Field::Text(s) => Value::String(s.clone()),
            Field::Object(ObjectId(id)) | Field::List(ListId(id)) => {
                self.render_node(*id, ancestors)
            }
        }
    }
}
