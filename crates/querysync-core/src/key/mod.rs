//! Query key generation and matching.
//!
//! A [`QueryKey`] is an ordered sequence of [`KeySegment`]s, usually a
//! query name followed by its parameters. Keys built from structurally
//! equal parameters are equal, hash identically, and render identically.

mod filter;
mod params;
mod segment;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};

pub use filter::KeyFilter;
pub use params::KeyParams;
pub use segment::KeySegment;

/// Key identifying one cached query.
///
/// # Example
///
/// ```
/// use querysync_core::{KeyParams, QueryKey, build_key};
///
/// let positional = QueryKey::new("userPosts").with(7).with("liked");
/// assert_eq!(positional.to_string(), "userPosts:7:liked");
///
/// let named = build_key("userPosts", &KeyParams::new().with("userId", 7));
/// assert_eq!(named.name(), Some("userPosts"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<KeySegment>);

impl QueryKey {
    /// Creates a key whose first segment is the query name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(vec![KeySegment::String(name.into())])
    }

    /// Creates a key from raw segments.
    pub fn from_segments(segments: Vec<KeySegment>) -> Self {
        Self(segments)
    }

    /// Returns the key with one more segment appended.
    pub fn with(mut self, segment: impl Into<KeySegment>) -> Self {
        self.0.push(segment.into());
        self
    }

    /// Appends a segment in place.
    pub fn push(&mut self, segment: impl Into<KeySegment>) {
        self.0.push(segment.into());
    }

    /// Returns the segments.
    pub fn segments(&self) -> &[KeySegment] {
        &self.0
    }

    /// Returns the query name (the first segment, when it is a string).
    pub fn name(&self) -> Option<&str> {
        self.0.first().and_then(KeySegment::as_str)
    }

    /// Returns the number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the key has no segments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if the first `prefix.len()` segments equal the prefix.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Returns true if any segment is, or contains, the given text.
    pub fn contains_text(&self, text: &str) -> bool {
        self.0.iter().any(|segment| segment.contains_text(text))
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl From<&str> for QueryKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Builds the key of a named query from its parameter record.
///
/// The key is `[name, params]`; empty parameter records produce `[name]`.
pub fn build_key(name: &str, params: &KeyParams) -> QueryKey {
    let key = QueryKey::new(name);
    if params.is_empty() {
        key
    } else {
        key.with(params.clone())
    }
}

/// Builds the key of a named query from any serializable parameter value.
///
/// Objects are normalized the same way as [`KeyParams`], so field order in
/// the parameter type does not affect the key.
pub fn build_key_from<P: Serialize + ?Sized>(name: &str, params: &P) -> Result<QueryKey> {
    let value = serde_json::to_value(params)
        .map_err(|e| QueryError::decode(format!("cannot encode params for '{name}': {e}")))?;
    let key = QueryKey::new(name);
    Ok(match value {
        serde_json::Value::Null => key,
        serde_json::Value::Object(map) if map.is_empty() => key,
        other => key.with(KeySegment::from(other)),
    })
}

/// Returns true if the filter selects the key.
pub fn matches(key: &QueryKey, filter: &KeyFilter) -> bool {
    filter.matches(key)
}
