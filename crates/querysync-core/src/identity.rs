//! Viewer identity seeded into query parameters.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of the signed-in viewer.
///
/// # Example
///
/// ```
/// use querysync_core::ViewerId;
///
/// let viewer = ViewerId::new(42);
/// assert_eq!(viewer.into_inner(), 42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewerId(i64);

impl ViewerId {
    /// Name of the query parameter carrying the viewer id.
    pub const PARAM: &'static str = "viewerId";

    /// Creates a new viewer id.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    pub fn into_inner(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ViewerId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Read-only source of the viewer's identity.
///
/// The identity lives in a persistent key-value store owned by the host;
/// this crate only ever reads it.
pub trait IdentitySource: Send + Sync {
    /// Returns the viewer id, if a viewer is signed in.
    fn viewer_id(&self) -> Option<ViewerId>;
}

/// Identity fixed at construction time.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticIdentity {
    viewer: Option<ViewerId>,
}

impl StaticIdentity {
    /// Creates an identity for the given viewer.
    pub fn new(id: i64) -> Self {
        Self {
            viewer: Some(ViewerId::new(id)),
        }
    }

    /// Creates an identity with no signed-in viewer.
    pub fn anonymous() -> Self {
        Self { viewer: None }
    }
}

impl IdentitySource for StaticIdentity {
    fn viewer_id(&self) -> Option<ViewerId> {
        self.viewer
    }
}

impl From<Option<i64>> for StaticIdentity {
    fn from(id: Option<i64>) -> Self {
        Self {
            viewer: id.map(ViewerId::new),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_identity() {
        assert_eq!(StaticIdentity::new(5).viewer_id(), Some(ViewerId::new(5)));
        assert_eq!(StaticIdentity::anonymous().viewer_id(), None);
        assert_eq!(StaticIdentity::from(None).viewer_id(), None);
    }
}
