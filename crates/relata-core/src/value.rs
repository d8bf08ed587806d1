//! The runtime value type moved through the engine.
//!
//! `Value` is the lowest common denominator between client JSON payloads and
//! whatever native representation the backing store uses. Schema-discovered
//! tables have no compile-time row type, so every field of every record is
//! one of these variants.

use serde_json::Number;

/// A single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL / JSON null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer (covers all integral column widths).
    Int(i64),
    /// Double-precision float.
    Float(f64),
    /// Text / varchar.
    Text(String),
    /// Structured JSON kept opaque (object payloads, nested relation data).
    Json(serde_json::Value),
    /// Ordered list of values (IN-list operands, multi-valued params).
    List(Vec<Value>),
    /// A raw database-side expression. Emitted when a field descriptor
    /// declares a per-context DB function; must never be bound as a literal.
    Expr(String),
}

impl Value {
    /// True if this is `Value::Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow as `&str` if this is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Integral view. `Float` values with no fractional part convert.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// Floating-point view (`Int` widens).
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Boolean view.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert a JSON value into a `Value`.
    ///
    /// Objects and arrays-of-objects stay opaque as `Json`; arrays of
    /// scalars become `List`.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => n.as_i64().map_or_else(
                || Value::Float(n.as_f64().unwrap_or(f64::NAN)),
                Value::Int,
            ),
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => {
                if items.iter().any(serde_json::Value::is_object) {
                    Value::Json(json.clone())
                } else {
                    Value::List(items.iter().map(Value::from_json).collect())
                }
            }
            serde_json::Value::Object(_) => Value::Json(json.clone()),
        }
    }

    /// Convert back into a JSON value.
    ///
    /// `Expr` serializes as its source text; it is a storage-layer concern
    /// and should normally be consumed before records are echoed to clients.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Text(s) | Value::Expr(s) => serde_json::Value::String(s.clone()),
            Value::Json(j) => j.clone(),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
        }
    }

    /// True for variants that address more than one scalar (composite ids,
    /// nested payloads).
    #[must_use]
    pub const fn is_composite(&self) -> bool {
        matches!(self, Value::Json(_) | Value::List(_))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) | Value::Expr(s) => write!(f, "{s}"),
            Value::Json(j) => write!(f, "{j}"),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}
