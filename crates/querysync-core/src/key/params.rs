use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::KeySegment;
use crate::identity::{IdentitySource, ViewerId};

/// Parameter record of a named query.
///
/// Entries are kept sorted by name so that two parameter records built in
/// different orders encode to the same key segment.
///
/// # Example
///
/// ```
/// use querysync_core::KeyParams;
///
/// let a = KeyParams::new().with("userId", 7).with("tag", "rust");
/// let b = KeyParams::new().with("tag", "rust").with("userId", 7);
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyParams {
    inner: BTreeMap<String, KeySegment>,
}

impl KeyParams {
    /// Creates an empty parameter record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record with the given parameter set.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<KeySegment>) -> Self {
        self.insert(name, value);
        self
    }

    /// Returns the record with the viewer id seeded from an identity source.
    ///
    /// The parameter is set to null when no viewer is known, so keys built
    /// before and after sign-in never collide.
    pub fn with_viewer(self, identity: &dyn IdentitySource) -> Self {
        let viewer = identity.viewer_id().map(ViewerId::into_inner);
        self.with(ViewerId::PARAM, viewer)
    }

    /// Sets a parameter, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<KeySegment>) {
        self.inner.insert(name.into(), value.into());
    }

    /// Removes a parameter and returns its previous value.
    pub fn remove(&mut self, name: &str) -> Option<KeySegment> {
        self.inner.remove(name)
    }

    /// Returns the value of a parameter.
    pub fn get(&self, name: &str) -> Option<&KeySegment> {
        self.inner.get(name)
    }

    /// Iterates over parameters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &KeySegment)> {
        self.inner.iter()
    }

    /// Returns the number of parameters.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if no parameter is set.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Renders non-null parameters as `name=value` pairs for a query string.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.inner
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect()
    }
}

impl From<KeyParams> for KeySegment {
    fn from(params: KeyParams) -> Self {
        KeySegment::Object(params.inner)
    }
}

impl FromIterator<(String, KeySegment)> for KeyParams {
    fn from_iter<I: IntoIterator<Item = (String, KeySegment)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for KeyParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", KeySegment::Object(self.inner.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::StaticIdentity;

    #[test]
    fn test_insertion_order_is_irrelevant() {
        let a = KeyParams::new().with("a", 1).with("b", 2);
        let b = KeyParams::new().with("b", 2).with("a", 1);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_with_viewer_seeds_identity() {
        let params = KeyParams::new().with_viewer(&StaticIdentity::new(42));
        assert_eq!(params.get("viewerId"), Some(&KeySegment::Integer(42)));

        let anonymous = KeyParams::new().with_viewer(&StaticIdentity::anonymous());
        assert_eq!(anonymous.get("viewerId"), Some(&KeySegment::Null));
    }

    #[test]
    fn test_query_pairs_skip_nulls() {
        let params = KeyParams::new()
            .with("size", 20)
            .with("tag", Option::<String>::None)
            .with("type", "liked");

        assert_eq!(
            params.to_query_pairs(),
            vec![
                ("size".to_string(), "20".to_string()),
                ("type".to_string(), "liked".to_string()),
            ]
        );
    }
}
