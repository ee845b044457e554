//! Contiguous window of loaded pages.

use querysync_core::{FeedPage, QueryError, Result, Tagged};
use serde::{Deserialize, Serialize};

/// Pages loaded so far, in ascending page order with no gaps.
///
/// # Example
///
/// ```
/// use querysync_core::FeedPage;
/// use querysync_feed::FeedWindow;
///
/// let mut window = FeedWindow::new();
/// window.append(FeedPage::new(vec!["a", "b"], 0, false, 3)).unwrap();
/// window.append(FeedPage::new(vec!["c"], 1, true, 3)).unwrap();
///
/// assert_eq!(window.items().collect::<Vec<_>>(), vec![&"a", &"b", &"c"]);
/// assert!(!window.has_next_page());
///
/// // Pages must be contiguous.
/// assert!(window.append(FeedPage::new(vec!["d"], 3, true, 4)).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedWindow<T> {
    pages: Vec<FeedPage<T>>,
}

impl<T> FeedWindow<T> {
    /// Creates an empty window.
    pub fn new() -> Self {
        Self { pages: Vec::new() }
    }

    /// Returns the loaded pages.
    pub fn pages(&self) -> &[FeedPage<T>] {
        &self.pages
    }

    /// Returns the number of loaded pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Returns true if no page is loaded.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Returns the most recent page.
    pub fn last_page(&self) -> Option<&FeedPage<T>> {
        self.pages.last()
    }

    /// Returns the number the next appended page must carry.
    pub fn next_page_number(&self) -> u32 {
        self.last_page().map_or(0, |page| page.page_number + 1)
    }

    /// Appends a page.
    ///
    /// The page must be page 0 on an empty window, or follow the last page.
    pub fn append(&mut self, page: FeedPage<T>) -> Result<()> {
        let expected = self.next_page_number();
        if page.page_number != expected {
            return Err(QueryError::PageOutOfOrder {
                expected,
                actual: page.page_number,
            });
        }
        self.pages.push(page);
        Ok(())
    }

    /// Iterates items in page order.
    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.pages.iter().flat_map(|page| page.items.iter())
    }

    /// Returns the number of loaded items.
    pub fn item_count(&self) -> usize {
        self.pages.iter().map(FeedPage::len).sum()
    }

    /// Returns true if the last loaded page is not the final one.
    ///
    /// Nothing is known about an empty window, so it reports no next page.
    pub fn has_next_page(&self) -> bool {
        self.last_page().is_some_and(|page| !page.is_last)
    }

    /// Returns the total reported by the most recent page.
    pub fn total_elements(&self) -> u64 {
        self.last_page().map_or(0, |page| page.total_elements)
    }

    /// Consumes the window, returning the items in page order.
    pub fn into_items(self) -> Vec<T> {
        self.pages.into_iter().flat_map(|page| page.items).collect()
    }
}

impl<T: Tagged> FeedWindow<T> {
    /// Returns loaded items carrying `tag`, or every item for `None`.
    pub fn filtered_by_tag(&self, tag: Option<&str>) -> Vec<&T> {
        match tag {
            Some(tag) => self.items().filter(|item| item.has_tag(tag)).collect(),
            None => self.items().collect(),
        }
    }
}

impl<T> Default for FeedWindow<T> {
    fn default() -> Self {
        Self::new()
    }
}
