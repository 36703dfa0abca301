//! # Type System for Path Parameters
//!
//! Placeholder kinds, their matching fragments and the coercion of captured
//! segments into typed values.
//!
//! A template declares `<name>` for a plain string segment or `<kind:name>`
//! for a typed one. The supported kinds are `int`, `float` and `bool`.

use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Supported path placeholder kinds
///
/// `String` is the implicit kind of an untyped `<name>` placeholder; it is
/// never spelled out in a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParamType {
    /// Untyped placeholder - no conversion
    #[default]
    String,
    /// Integer type - parses to i64
    Int,
    /// Float type - parses to f64
    Float,
    /// Boolean type - yes/no vocabulary
    Bool,
}

impl ParamType {
    /// Parse a kind token from a template (e.g. "int" from `<int:id>`)
    ///
    /// Returns `None` for tokens outside the supported set.
    #[must_use]
    pub fn from_specifier(s: &str) -> Option<Self> {
        match s {
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "bool" => Some(Self::Bool),
            _ => None,
        }
    }

    /// Get the type name for error messages
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
        }
    }

    /// Whether the placeholder was declared with an explicit kind
    #[must_use]
    pub const fn is_typed(&self) -> bool {
        !matches!(self, Self::String)
    }

    /// Regex fragment matching one segment of this kind
    #[must_use]
    pub const fn regex_fragment(&self) -> &'static str {
        match self {
            Self::String => r"[^/]+",
            Self::Int => r"[0-9]+",
            Self::Float => r"[0-9]+\.?[0-9]*",
            Self::Bool => r"(?i:true|false|yes|no|1|0)",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Bound argument value
///
/// Path placeholders carry coerced values. Body, form and query values are
/// raw: strings stay `String`, any other JSON value stays `Json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// String value (no conversion performed)
    String(String),
    /// Integer value (i64)
    Int(i64),
    /// Float value (f64)
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// Raw JSON value taken from a request body
    Json(Value),
}

impl ParamValue {
    /// Get the value as a string
    #[must_use]
    pub fn as_string(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Json(v) => v.to_string(),
        }
    }

    /// Borrow as `&str` if String variant
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as i64 if Int variant
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 if Float variant
    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as bool if Bool variant
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Wrap a raw JSON value taken from a request body
    #[must_use]
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(s) => Self::String(s),
            other => Self::Json(other),
        }
    }
}

/// Convert a captured segment to a typed value
///
/// # Errors
///
/// Returns `Error::Coercion` if the segment does not fit the kind, e.g. an
/// integer that overflows `i64`.
pub fn convert_param(name: &str, raw: &str, param_type: ParamType) -> Result<ParamValue> {
    let fail = || Error::Coercion {
        name: name.to_string(),
        value: raw.to_string(),
        kind: param_type.type_name(),
    };

    match param_type {
        ParamType::String => Ok(ParamValue::String(raw.to_string())),
        ParamType::Int => raw.parse::<i64>().map(ParamValue::Int).map_err(|_| fail()),
        ParamType::Float => raw.parse::<f64>().map(ParamValue::Float).map_err(|_| fail()),
        ParamType::Bool => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(ParamValue::Bool(true)),
            "false" | "0" | "no" => Ok(ParamValue::Bool(false)),
            _ => Err(fail()),
        },
    }
}

/// Arguments bound to one dispatch
///
/// Built fresh for every request by `Route::validate` and the dispatch
/// context; never shared between requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Arguments {
    values: HashMap<String, ParamValue>,
}

impl Arguments {
    /// Create an empty argument map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value
    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.values.insert(name.into(), value);
    }

    /// Insert only if the name is still unbound
    ///
    /// Returns `true` when the value was inserted.
    pub fn insert_if_absent(&mut self, name: impl Into<String>, value: ParamValue) -> bool {
        match self.values.entry(name.into()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    /// Get a value by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Get a string argument
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(ParamValue::as_str)
    }

    /// Get an integer argument
    #[must_use]
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.values.get(name).and_then(ParamValue::as_int)
    }

    /// Get a float argument
    #[must_use]
    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(ParamValue::as_float)
    }

    /// Get a boolean argument
    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.values.get(name).and_then(ParamValue::as_bool)
    }

    /// Whether the name is bound
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of bound arguments
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing is bound
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over bound names and values
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
