//! Page loader trait definition.

use async_trait::async_trait;
use querysync_core::{FeedPage, KeyParams, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Items a feed can accumulate.
///
/// Windows are stored in the cache as JSON, so items must round-trip
/// through serde.
pub trait FeedItem: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> FeedItem for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// A source of feed pages.
///
/// This trait abstracts over the transport so that a feed can page through
/// HTTP endpoints, fixtures, or anything else without knowing how pages are
/// produced.
///
/// # Example
///
/// ```ignore
/// use querysync_feed::PageLoader;
///
/// struct Fixture;
///
/// #[async_trait]
/// impl PageLoader<String> for Fixture {
///     async fn load_page(&self, params: &KeyParams, page: u32) -> Result<FeedPage<String>> {
///         Ok(FeedPage::new(vec![format!("item-{page}")], page, page == 2, 3))
///     }
///
///     fn name(&self) -> &str {
///         "fixture"
///     }
/// }
/// ```
#[async_trait]
pub trait PageLoader<T>: Send + Sync {
    /// Loads one page for the given base parameters.
    ///
    /// # Errors
    ///
    /// - `QueryError::Network` for transient failures; the feed retries these
    /// - `QueryError::Validation` if the server rejects the request
    /// - `QueryError::Decode` if the response is not a page
    async fn load_page(&self, params: &KeyParams, page: u32) -> Result<FeedPage<T>>;

    /// Returns the name of this loader, used for logging.
    fn name(&self) -> &str {
        "loader"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingLoader {
        name: String,
    }

    #[async_trait]
    impl PageLoader<u32> for CountingLoader {
        async fn load_page(&self, _params: &KeyParams, page: u32) -> Result<FeedPage<u32>> {
            Ok(FeedPage::new(vec![page * 10, page * 10 + 1], page, page == 1, 4))
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    #[tokio::test]
    async fn test_loader_pages() {
        let loader = CountingLoader {
            name: "counting".to_string(),
        };

        let page = loader.load_page(&KeyParams::new(), 1).await.unwrap();

        assert_eq!(page.items, vec![10, 11]);
        assert!(page.is_last);
        assert_eq!(loader.name(), "counting");
    }
}
