//! Key filters used to select cache entries for invalidation.

use std::fmt;
use std::sync::Arc;

use glob::Pattern;

use super::QueryKey;
use crate::error::{QueryError, Result};

type KeyPredicate = Arc<dyn Fn(&QueryKey) -> bool + Send + Sync>;

/// Selects a set of query keys.
///
/// # Example
///
/// ```
/// use querysync_core::{KeyFilter, QueryKey};
///
/// let key = QueryKey::new("userPosts").with(7).with("archive");
///
/// assert!(KeyFilter::prefix(QueryKey::new("userPosts")).matches(&key));
/// assert!(KeyFilter::containing("archive").matches(&key));
/// assert!(!KeyFilter::exact(QueryKey::new("userPosts")).matches(&key));
/// ```
#[derive(Clone)]
pub enum KeyFilter {
    /// Matches one key exactly.
    Exact(QueryKey),
    /// Matches keys whose leading segments equal the prefix.
    Prefix(QueryKey),
    /// Matches keys with any segment that is or contains the text.
    Contains(String),
    /// Matches the `:`-joined display form of the key against a glob.
    Pattern(Pattern),
    /// Matches keys accepted by an arbitrary predicate.
    Predicate(KeyPredicate),
    /// Matches every key.
    All,
}

impl KeyFilter {
    /// Creates an exact-key filter.
    pub fn exact(key: QueryKey) -> Self {
        Self::Exact(key)
    }

    /// Creates a prefix filter.
    pub fn prefix(prefix: QueryKey) -> Self {
        Self::Prefix(prefix)
    }

    /// Creates a filter matching keys that mention the given text.
    pub fn containing(text: impl Into<String>) -> Self {
        Self::Contains(text.into())
    }

    /// Creates a glob filter.
    ///
    /// The pattern is matched against the key's display form, where
    /// segments are joined with `:`; for example `userPosts:*`.
    pub fn pattern(pattern: &str) -> Result<Self> {
        Pattern::new(pattern)
            .map(Self::Pattern)
            .map_err(|e| QueryError::validation(format!("invalid key pattern '{pattern}': {e}")))
    }

    /// Creates a predicate filter.
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&QueryKey) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(predicate))
    }

    /// Returns true if the filter selects the key.
    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            Self::Exact(expected) => key == expected,
            Self::Prefix(prefix) => key.starts_with(prefix),
            Self::Contains(text) => key.contains_text(text),
            Self::Pattern(pattern) => pattern.matches(&key.to_string()),
            Self::Predicate(predicate) => predicate(key),
            Self::All => true,
        }
    }
}

impl From<QueryKey> for KeyFilter {
    fn from(key: QueryKey) -> Self {
        Self::Exact(key)
    }
}

impl fmt::Debug for KeyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(key) => f.debug_tuple("Exact").field(key).finish(),
            Self::Prefix(key) => f.debug_tuple("Prefix").field(key).finish(),
            Self::Contains(text) => f.debug_tuple("Contains").field(text).finish(),
            Self::Pattern(pattern) => f.debug_tuple("Pattern").field(&pattern.as_str()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
            Self::All => f.write_str("All"),
        }
    }
}

impl fmt::Display for KeyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(key) => write!(f, "={}", key),
            Self::Prefix(key) => write!(f, "{}*", key),
            Self::Contains(text) => write!(f, "*{}*", text),
            Self::Pattern(pattern) => write!(f, "{}", pattern.as_str()),
            Self::Predicate(_) => write!(f, "<predicate>"),
            Self::All => write!(f, "*"),
        }
    }
}
