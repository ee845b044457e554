use std::collections::BTreeMap;
use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single component of a [`QueryKey`](super::QueryKey).
///
/// Segments are either primitives or plain objects/arrays built from
/// primitives. Objects use a `BTreeMap`, so two objects with the same
/// entries are equal (and hash identically) regardless of the order in
/// which their properties were inserted. Arrays keep their order.
///
/// # Example
///
/// ```
/// use querysync_core::KeySegment;
///
/// let seg: KeySegment = "userPosts".into();
/// assert_eq!(seg.as_str(), Some("userPosts"));
///
/// let arr: KeySegment = vec![1, 2, 3].into();
/// assert!(matches!(arr, KeySegment::Array(_)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeySegment {
    /// Null value (absent optional parameter)
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (signed 64-bit)
    Integer(i64),
    /// Floating point value (wrapped in OrderedFloat for Eq/Hash support)
    Float(OrderedFloat<f64>),
    /// String value
    String(String),
    /// Array of segments
    Array(Vec<KeySegment>),
    /// Plain object with sorted keys
    Object(BTreeMap<String, KeySegment>),
}

impl KeySegment {
    /// Returns true if the segment is Null.
    pub fn is_null(&self) -> bool {
        matches!(self, KeySegment::Null)
    }

    /// Returns the segment as a str if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            KeySegment::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the segment as an i64 if it is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            KeySegment::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the object entries if the segment is an object.
    pub fn as_object(&self) -> Option<&BTreeMap<String, KeySegment>> {
        match self {
            KeySegment::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Returns true if this segment is, or contains, the given text.
    ///
    /// Strings match on substring. Arrays and objects match when any
    /// nested value (or object field name) contains the text.
    pub fn contains_text(&self, text: &str) -> bool {
        match self {
            KeySegment::String(s) => s.contains(text),
            KeySegment::Array(items) => items.iter().any(|item| item.contains_text(text)),
            KeySegment::Object(map) => map
                .iter()
                .any(|(name, value)| name.contains(text) || value.contains_text(text)),
            _ => false,
        }
    }
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySegment::Null => write!(f, "null"),
            KeySegment::Bool(b) => write!(f, "{}", b),
            KeySegment::Integer(i) => write!(f, "{}", i),
            KeySegment::Float(v) => write!(f, "{}", v.into_inner()),
            KeySegment::String(s) => write!(f, "{}", s),
            KeySegment::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            },
            KeySegment::Object(map) => {
                write!(f, "{{")?;
                for (i, (name, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}={}", name, value)?;
                }
                write!(f, "}}")
            },
        }
    }
}

// ==========================================
// From Conversions for Ergonomics
// ==========================================

impl From<bool> for KeySegment {
    fn from(v: bool) -> Self {
        KeySegment::Bool(v)
    }
}

impl From<i64> for KeySegment {
    fn from(v: i64) -> Self {
        KeySegment::Integer(v)
    }
}

impl From<i32> for KeySegment {
    fn from(v: i32) -> Self {
        KeySegment::Integer(v as i64)
    }
}

impl From<u32> for KeySegment {
    fn from(v: u32) -> Self {
        KeySegment::Integer(v as i64)
    }
}

impl From<f64> for KeySegment {
    fn from(v: f64) -> Self {
        KeySegment::Float(OrderedFloat(v))
    }
}

impl From<String> for KeySegment {
    fn from(v: String) -> Self {
        KeySegment::String(v)
    }
}

impl From<&str> for KeySegment {
    fn from(v: &str) -> Self {
        KeySegment::String(v.to_string())
    }
}

impl<T: Into<KeySegment>> From<Option<T>> for KeySegment {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(KeySegment::Null)
    }
}

impl<T: Into<KeySegment>> From<Vec<T>> for KeySegment {
    fn from(v: Vec<T>) -> Self {
        KeySegment::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, KeySegment>> for KeySegment {
    fn from(v: BTreeMap<String, KeySegment>) -> Self {
        KeySegment::Object(v)
    }
}

impl From<Value> for KeySegment {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => KeySegment::Null,
            Value::Bool(b) => KeySegment::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => KeySegment::Integer(i),
                None => KeySegment::Float(OrderedFloat(n.as_f64().unwrap_or(f64::NAN))),
            },
            Value::String(s) => KeySegment::String(s),
            Value::Array(items) => KeySegment::Array(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                KeySegment::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            },
        }
    }
}
