//! Page and relationship payloads exchanged with the server.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of a paginated feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage<T> {
    /// Items in server order.
    pub items: Vec<T>,
    /// Zero-based page number.
    pub page_number: u32,
    /// True if no page follows this one.
    pub is_last: bool,
    /// Total number of items across all pages, as reported by the server.
    pub total_elements: u64,
}

impl<T> FeedPage<T> {
    /// Creates a new page.
    pub fn new(items: Vec<T>, page_number: u32, is_last: bool, total_elements: u64) -> Self {
        Self {
            items,
            page_number,
            is_last,
            total_elements,
        }
    }

    /// Returns the number of items in this page.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the page carries no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Paginated response body as returned by the server.
///
/// ```
/// use querysync_core::{FeedPage, PageResponse};
///
/// let body = r#"{"content":["a","b"],"number":0,"last":false,"totalElements":3}"#;
/// let response: PageResponse<String> = serde_json::from_str(body).unwrap();
/// let page: FeedPage<String> = response.into();
/// assert_eq!(page.items, vec!["a", "b"]);
/// assert!(!page.is_last);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    /// Items of the page.
    pub content: Vec<T>,
    /// Zero-based page number.
    pub number: u32,
    /// True if this is the final page.
    pub last: bool,
    /// Total number of items across all pages.
    pub total_elements: u64,
}

impl<T> From<PageResponse<T>> for FeedPage<T> {
    fn from(response: PageResponse<T>) -> Self {
        FeedPage::new(
            response.content,
            response.number,
            response.last,
            response.total_elements,
        )
    }
}

/// Authoritative relationship state returned by the server after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerToggle {
    /// Whether the relationship is active (archived, following).
    pub is_active: bool,
    /// Relationship count (archive count, follower count).
    pub count: u64,
}

impl ServerToggle {
    /// Creates a new server toggle payload.
    pub fn new(is_active: bool, count: u64) -> Self {
        Self { is_active, count }
    }
}

/// Client-side state of a binary relationship toggle.
///
/// ```
/// use querysync_core::{ServerToggle, ToggleState};
///
/// let state = ToggleState::from(ServerToggle::new(false, 3));
/// let optimistic = state.flipped();
/// assert!(optimistic.is_active);
/// assert_eq!(optimistic.count, 4);
/// assert!(optimistic.pending);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleState {
    /// Whether the relationship is active.
    pub is_active: bool,
    /// Relationship count.
    pub count: u64,
    /// True while a toggle is in flight.
    #[serde(default)]
    pub pending: bool,
}

impl ToggleState {
    /// Creates a settled state.
    pub fn new(is_active: bool, count: u64) -> Self {
        Self {
            is_active,
            count,
            pending: false,
        }
    }

    /// Returns the optimistic guess for a toggle of this state.
    ///
    /// The count moves by one in the direction of the flip and never drops
    /// below zero.
    pub fn flipped(&self) -> Self {
        let is_active = !self.is_active;
        let count = if is_active {
            self.count.saturating_add(1)
        } else {
            self.count.saturating_sub(1)
        };
        Self {
            is_active,
            count,
            pending: true,
        }
    }

    /// Returns the settled state reported by the server.
    pub fn settled(server: ServerToggle) -> Self {
        Self::new(server.is_active, server.count)
    }
}

impl From<ServerToggle> for ToggleState {
    fn from(server: ServerToggle) -> Self {
        Self::settled(server)
    }
}

/// Items that carry a set of tags for client-side filtering.
pub trait Tagged {
    /// Returns true if the item is tagged with `tag`.
    fn has_tag(&self, tag: &str) -> bool;
}

/// Raw JSON items are tagged through their `tags` array, whose entries are
/// either strings or objects with a `name` (or `tagName`) field.
impl Tagged for Value {
    fn has_tag(&self, tag: &str) -> bool {
        let Some(tags) = self.get("tags").and_then(Value::as_array) else {
            return false;
        };
        tags.iter().any(|entry| match entry {
            Value::String(name) => name == tag,
            Value::Object(map) => map
                .get("name")
                .or_else(|| map.get("tagName"))
                .and_then(Value::as_str)
                .is_some_and(|name| name == tag),
            _ => false,
        })
    }
}
