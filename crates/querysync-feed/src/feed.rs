//! Infinite-pagination accumulator.
//!
//! A [`PaginatedFeed`] keeps a contiguous [`FeedWindow`] of pages for one set
//! of base parameters. The window lives in the cache store under the feed's
//! base key, so invalidation filters and optimistic updates reach it like any
//! other query.
//!
//! State machine:
//!
//! ```text
//! Empty -> LoadingFirst -> Ready <-> LoadingNext
//!                          Ready <-> Refreshing
//! any load failure -> Error, retry -> LoadingFirst (or the failed load)
//! set_base_params: any state -> Empty -> LoadingFirst
//! ```
//!
//! Results of loads started before the last `set_base_params` are discarded
//! by comparing the generation captured at call time with the current one.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use querysync_cache::{CacheEvent, CacheEventKind, CacheStore, Fetcher, QueryClient, RetryPolicy, Subscription};
use querysync_core::{FeedPage, KeyParams, QueryError, QueryKey, Result, Tagged, build_key};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::loader::{FeedItem, PageLoader};
use crate::window::FeedWindow;

/// Parameter name reserved for the page number; never part of the base key.
pub const PAGE_PARAM: &str = "page";

/// Lifecycle state of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    /// Nothing loaded for the current base parameters.
    Empty,
    /// Page 0 is loading.
    LoadingFirst,
    /// Pages are loaded and no load is running.
    Ready,
    /// The page after the last loaded one is loading.
    LoadingNext,
    /// Every loaded page is being re-fetched.
    Refreshing,
    /// The last load failed. Loaded pages are kept.
    Error,
}

impl FeedState {
    /// Returns true while a load is running.
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::LoadingFirst | Self::LoadingNext | Self::Refreshing)
    }
}

/// Result of a feed operation that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Pages were written into the window.
    Loaded {
        /// Number of the last page written
        page_number: u32,
        /// Items written by this load
        item_count: usize,
    },
    /// Nothing to do: a load is running, or the last page is loaded.
    Skipped,
    /// The result belonged to replaced base parameters and was dropped.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadKind {
    First,
    Next,
    Refresh,
}

struct FeedControl {
    state: FeedState,
    base_params: KeyParams,
    base_key: QueryKey,
    generation: u64,
    last_error: Option<QueryError>,
    failed: Option<LoadKind>,
    refresh_requested: bool,
    subscription: Option<Subscription>,
}

struct FeedInner<T> {
    name: String,
    loader: Arc<dyn PageLoader<T>>,
    store: CacheStore,
    fetcher: Fetcher,
    retry: RetryPolicy,
    control: Mutex<FeedControl>,
}

/// Accumulates sequential pages of one paginated query.
///
/// Cloning a feed yields another handle to the same feed.
///
/// # Example
///
/// ```ignore
/// let feed = PaginatedFeed::new(&client, "userPosts", params, PagedEndpoint::new(http, "/posts"));
///
/// feed.load_first().await?;
/// while feed.has_next_page() {
///     feed.load_next().await?;
/// }
/// let rust_posts = feed.filtered_by_tag(Some("rust"));
/// ```
pub struct PaginatedFeed<T> {
    inner: Arc<FeedInner<T>>,
}

impl<T: FeedItem> PaginatedFeed<T> {
    /// Creates an empty feed retrying with the client's default policy.
    pub fn new<L>(client: &QueryClient, name: impl Into<String>, base_params: KeyParams, loader: L) -> Self
    where
        L: PageLoader<T> + 'static,
    {
        let retry = client.config().retry.clone();
        Self::with_retry_policy(client, name, base_params, loader, retry)
    }

    /// Creates an empty feed retrying page loads with `retry`.
    pub fn with_retry_policy<L>(
        client: &QueryClient,
        name: impl Into<String>,
        mut base_params: KeyParams,
        loader: L,
        retry: RetryPolicy,
    ) -> Self
    where
        L: PageLoader<T> + 'static,
    {
        let name = name.into();
        base_params.remove(PAGE_PARAM);
        let base_key = build_key(&name, &base_params);

        let inner = Arc::new(FeedInner {
            name,
            loader: Arc::new(loader),
            store: client.store().clone(),
            fetcher: client.fetcher().clone(),
            retry,
            control: Mutex::new(FeedControl {
                state: FeedState::Empty,
                base_params,
                base_key: base_key.clone(),
                generation: 0,
                last_error: None,
                failed: None,
                refresh_requested: false,
                subscription: None,
            }),
        });
        let subscription = inner.subscribe(&base_key);
        inner.control.lock().subscription = Some(subscription);

        Self { inner }
    }

    /// Loads page 0, replacing whatever the window held.
    ///
    /// Skipped while another load is running.
    pub async fn load_first(&self) -> Result<LoadOutcome> {
        let Some(ticket) = self.inner.begin(LoadKind::First, FeedState::LoadingFirst) else {
            return Ok(LoadOutcome::Skipped);
        };
        let result = self.inner.run_first(&ticket).await;
        self.inner.finish(&ticket, result)
    }

    /// Loads the page after the last loaded one and appends it.
    ///
    /// Skipped while another load is running or once the last page is
    /// loaded. On an empty window this is [`load_first`](Self::load_first).
    pub async fn load_next(&self) -> Result<LoadOutcome> {
        let next_page = {
            let mut control = self.inner.control.lock();
            if control.state.is_loading() {
                return Ok(LoadOutcome::Skipped);
            }
            let window = self.inner.window(&control.base_key);
            if window.is_empty() {
                None
            } else if !window.has_next_page() {
                return Ok(LoadOutcome::Skipped);
            } else {
                control.state = FeedState::LoadingNext;
                Some((control.ticket(LoadKind::Next), window.next_page_number()))
            }
        };
        let Some((ticket, page)) = next_page else {
            return self.load_first().await;
        };

        let result = self.inner.run_next(&ticket, page).await;
        self.inner.finish(&ticket, result)
    }

    /// Re-fetches every loaded page and swaps the window in one write.
    ///
    /// Pages are reloaded in order from page 0 and the sequence stops early
    /// if a page now reports being the last. On failure the previous window
    /// stays in place. Runs automatically when the feed's key is
    /// invalidated.
    pub async fn refresh(&self) -> Result<LoadOutcome> {
        let refresh = {
            let mut control = self.inner.control.lock();
            if control.state.is_loading() {
                control.refresh_requested = true;
                return Ok(LoadOutcome::Skipped);
            }
            let page_count = self.inner.window(&control.base_key).page_count();
            if page_count == 0 {
                None
            } else {
                control.state = FeedState::Refreshing;
                control.refresh_requested = false;
                Some((control.ticket(LoadKind::Refresh), page_count))
            }
        };
        let Some((ticket, page_count)) = refresh else {
            return self.load_first().await;
        };

        let result = self.inner.run_refresh(&ticket, page_count).await;
        self.inner.finish(&ticket, result)
    }

    /// Repeats the load that failed.
    ///
    /// Skipped unless the feed is in [`FeedState::Error`]. Only a failed
    /// first load goes back through [`FeedState::LoadingFirst`] and restarts
    /// from page 0. A failed next page moves `Error -> LoadingNext` and
    /// requests that page again on top of the pages loaded so far; a failed
    /// refresh moves `Error -> Refreshing`. Neither drops loaded pages.
    pub async fn retry(&self) -> Result<LoadOutcome> {
        let failed = {
            let control = self.inner.control.lock();
            if control.state != FeedState::Error {
                return Ok(LoadOutcome::Skipped);
            }
            control.failed.unwrap_or(LoadKind::First)
        };
        debug!(feed = %self.inner.name, load = ?failed, "Retrying feed load");
        match failed {
            LoadKind::First => self.load_first().await,
            LoadKind::Next => self.load_next().await,
            LoadKind::Refresh => self.refresh().await,
        }
    }

    /// Replaces the base parameters.
    ///
    /// A `page` parameter is ignored. If the remaining parameters differ
    /// from the current ones, every loaded page is dropped, loads still
    /// running for the old parameters are abandoned, and page 0 is loaded
    /// for the new ones. Identical parameters are a no-op.
    pub async fn set_base_params(&self, mut next: KeyParams) -> Result<LoadOutcome> {
        next.remove(PAGE_PARAM);
        let next_key = build_key(&self.inner.name, &next);
        let (previous, generation) = {
            let mut control = self.inner.control.lock();
            if control.base_params == next {
                return Ok(LoadOutcome::Skipped);
            }
            control.generation += 1;
            control.base_params = next;
            control.base_key = next_key.clone();
            control.state = FeedState::Empty;
            control.last_error = None;
            control.failed = None;
            control.refresh_requested = false;
            (control.subscription.take(), control.generation)
        };
        drop(previous);

        self.inner.store.restore(&next_key, None);
        let subscription = self.inner.subscribe(&next_key);
        {
            let mut control = self.inner.control.lock();
            if control.generation == generation {
                control.subscription = Some(subscription);
            }
        }
        info!(feed = %self.inner.name, key = %next_key, generation, "Feed reset for new parameters");

        self.load_first().await
    }

    /// Returns every loaded item in page order.
    ///
    /// Items are not deduplicated; pages are assumed disjoint.
    pub fn items(&self) -> Vec<T> {
        self.current_window().into_items()
    }

    /// Returns the loaded items tagged with `tag`, or every item for `None`.
    ///
    /// Filtering only looks at pages already loaded and never requests
    /// more. [`has_next_page`](Self::has_next_page) keeps following the
    /// unfiltered pages, so a sparse tag can leave this list short (or
    /// empty) while more pages exist, and paging to the end can still yield
    /// few matches.
    pub fn filtered_by_tag(&self, tag: Option<&str>) -> Vec<T>
    where
        T: Tagged + Clone,
    {
        self.current_window()
            .filtered_by_tag(tag)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Returns true if the most recent page is not the last one.
    ///
    /// False until page 0 is loaded.
    pub fn has_next_page(&self) -> bool {
        self.current_window().has_next_page()
    }

    /// Returns the total reported by the most recent page.
    pub fn total_elements(&self) -> u64 {
        self.current_window().total_elements()
    }

    /// Returns the number of loaded pages.
    pub fn page_count(&self) -> usize {
        self.current_window().page_count()
    }

    /// Returns a copy of the loaded window.
    pub fn current_window(&self) -> FeedWindow<T> {
        let key = self.base_key();
        self.inner.window(&key)
    }

    fn spawn_refresh(inner: Arc<FeedInner<T>>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(feed = %inner.name, "No runtime available, feed refresh skipped");
            return;
        };
        let feed = Self { inner };
        runtime.spawn(async move {
            if let Err(e) = feed.refresh().await {
                debug!(feed = %feed.inner.name, error = %e, "Background feed refresh failed");
            }
        });
    }
}

impl<T> PaginatedFeed<T> {
    /// Returns the feed name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the current state.
    pub fn state(&self) -> FeedState {
        self.inner.control.lock().state
    }

    /// Returns the error of the last failed load, cleared by the next
    /// successful one.
    pub fn last_error(&self) -> Option<QueryError> {
        self.inner.control.lock().last_error.clone()
    }

    /// Returns the current base parameters.
    pub fn base_params(&self) -> KeyParams {
        self.inner.control.lock().base_params.clone()
    }

    /// Returns the key the window is cached under.
    pub fn base_key(&self) -> QueryKey {
        self.inner.control.lock().base_key.clone()
    }

    /// Returns the generation, bumped on every base parameter change.
    pub fn generation(&self) -> u64 {
        self.inner.control.lock().generation
    }
}

impl<T> Clone for PaginatedFeed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for PaginatedFeed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let control = self.inner.control.lock();
        f.debug_struct("PaginatedFeed")
            .field("name", &self.inner.name)
            .field("loader", &self.inner.loader.name())
            .field("state", &control.state)
            .field("base_key", &control.base_key)
            .field("generation", &control.generation)
            .finish()
    }
}

/// Generation and parameters captured when a load starts.
struct Ticket {
    kind: LoadKind,
    generation: u64,
    key: QueryKey,
    params: KeyParams,
}

impl FeedControl {
    fn ticket(&self, kind: LoadKind) -> Ticket {
        Ticket {
            kind,
            generation: self.generation,
            key: self.base_key.clone(),
            params: self.base_params.clone(),
        }
    }
}

impl<T: FeedItem> FeedInner<T> {
    fn subscribe(self: &Arc<Self>, key: &QueryKey) -> Subscription {
        let feed = Arc::downgrade(self);
        self.store
            .subscribe(key, move |event: &CacheEvent| Self::on_event(&feed, event))
    }

    fn on_event(feed: &Weak<Self>, event: &CacheEvent) {
        if event.kind != CacheEventKind::Invalidated {
            return;
        }
        let Some(inner) = feed.upgrade() else {
            return;
        };
        let refresh_now = {
            let mut control = inner.control.lock();
            if control.base_key != event.key {
                return;
            }
            match control.state {
                FeedState::Ready => true,
                state if state.is_loading() => {
                    control.refresh_requested = true;
                    false
                },
                _ => false,
            }
        };
        debug!(feed = %inner.name, key = %event.key, refresh_now, "Feed invalidated");
        if refresh_now {
            PaginatedFeed::<T>::spawn_refresh(inner);
        }
    }

    /// Moves to `state` and captures a ticket, unless a load is running.
    fn begin(&self, kind: LoadKind, state: FeedState) -> Option<Ticket> {
        let mut control = self.control.lock();
        if control.state.is_loading() {
            return None;
        }
        control.state = state;
        Some(control.ticket(kind))
    }

    fn window(&self, key: &QueryKey) -> FeedWindow<T> {
        match self.store.get_data::<FeedWindow<T>>(key) {
            Ok(window) => window.unwrap_or_default(),
            Err(e) => {
                warn!(feed = %self.name, key = %key, error = %e, "Cached feed window could not be decoded");
                FeedWindow::new()
            },
        }
    }

    fn ensure_current(&self, ticket: &Ticket) -> Result<()> {
        let current = self.control.lock().generation;
        if current != ticket.generation {
            return Err(QueryError::StaleGeneration {
                generation: ticket.generation,
                current,
            });
        }
        Ok(())
    }

    async fn fetch_page(&self, ticket: &Ticket, page: u32) -> Result<FeedPage<T>> {
        let loader = Arc::clone(&self.loader);
        let params = ticket.params.clone();
        let page_key = ticket.key.clone().with(page);
        debug!(feed = %self.name, loader = loader.name(), key = %page_key, "Loading feed page");

        let value = self
            .fetcher
            .coalesce(
                &page_key,
                move || {
                    let loader = Arc::clone(&loader);
                    let params = params.clone();
                    async move {
                        let page = loader.load_page(&params, page).await?;
                        Ok(serde_json::to_value(page)?)
                    }
                },
                &self.retry,
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn run_first(&self, ticket: &Ticket) -> Result<LoadOutcome> {
        let loaded = self.fetch_page(ticket, 0).await;
        self.ensure_current(ticket)?;

        let page = loaded?;
        let item_count = page.len();
        let mut window = FeedWindow::new();
        window.append(page)?;
        self.store.set_data(&ticket.key, &window)?;
        Ok(LoadOutcome::Loaded {
            page_number: 0,
            item_count,
        })
    }

    async fn run_next(&self, ticket: &Ticket, page_number: u32) -> Result<LoadOutcome> {
        let loaded = self.fetch_page(ticket, page_number).await;
        self.ensure_current(ticket)?;

        let page = loaded?;
        let item_count = page.len();
        self.store.try_update(&ticket.key, move |data| {
            let mut window = match data {
                Some(value) => FeedWindow::<T>::deserialize(value)?,
                None => FeedWindow::new(),
            };
            window.append(page)?;
            Ok(Some(serde_json::to_value(&window)?))
        })?;
        Ok(LoadOutcome::Loaded {
            page_number,
            item_count,
        })
    }

    async fn run_refresh(&self, ticket: &Ticket, page_count: usize) -> Result<LoadOutcome> {
        let mut window = FeedWindow::new();
        for page_number in 0..page_count {
            let page = self.fetch_page(ticket, page_number as u32).await;
            self.ensure_current(ticket)?;
            let page = page?;
            let is_last = page.is_last;
            window.append(page)?;
            if is_last {
                break;
            }
        }

        let item_count = window.item_count();
        let page_number = window.last_page().map_or(0, |page| page.page_number);
        self.store.set_data(&ticket.key, &window)?;
        Ok(LoadOutcome::Loaded {
            page_number,
            item_count,
        })
    }

    /// Records the outcome of a load started with `ticket`.
    fn finish(self: &Arc<Self>, ticket: &Ticket, result: Result<LoadOutcome>) -> Result<LoadOutcome> {
        if let Err(QueryError::StaleGeneration { generation, current }) = &result {
            debug!(feed = %self.name, generation, current, "Discarding result for replaced parameters");
            return Ok(LoadOutcome::Discarded);
        }
        if let Err(e) = &result {
            self.store.set_error(&ticket.key, e.clone());
        }

        let refresh_due = {
            let mut control = self.control.lock();
            if control.generation != ticket.generation {
                return Ok(LoadOutcome::Discarded);
            }
            match &result {
                Ok(_) => {
                    control.state = FeedState::Ready;
                    control.last_error = None;
                    control.failed = None;
                },
                Err(e) => {
                    control.state = FeedState::Error;
                    control.last_error = Some(e.clone());
                    control.failed = Some(ticket.kind);
                },
            }
            result.is_ok() && std::mem::take(&mut control.refresh_requested)
        };

        match &result {
            Ok(outcome) => debug!(feed = %self.name, key = %ticket.key, load = ?ticket.kind, outcome = ?outcome, "Feed load finished"),
            Err(e) => warn!(feed = %self.name, key = %ticket.key, load = ?ticket.kind, error = %e, "Feed load failed"),
        }
        if refresh_due {
            PaginatedFeed::<T>::spawn_refresh(Arc::clone(self));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use querysync_cache::CacheConfig;
    use serde_json::{Value, json};

    use super::*;

    /// Serves `pages` pages of two items each.
    struct FixedLoader {
        pages: u32,
    }

    #[async_trait]
    impl PageLoader<Value> for FixedLoader {
        async fn load_page(&self, params: &KeyParams, page: u32) -> Result<FeedPage<Value>> {
            let user = params.get("userId").and_then(|s| s.as_i64()).unwrap_or_default();
            let items = vec![
                json!({"id": format!("{user}-{page}-a"), "tags": ["rust"]}),
                json!({"id": format!("{user}-{page}-b"), "tags": []}),
            ];
            Ok(FeedPage::new(items, page, page + 1 == self.pages, u64::from(self.pages) * 2))
        }
    }

    fn feed(pages: u32) -> PaginatedFeed<Value> {
        let client = QueryClient::new(CacheConfig::default());
        PaginatedFeed::new(
            &client,
            "userPosts",
            KeyParams::new().with("userId", 1).with("page", 4),
            FixedLoader { pages },
        )
    }

    #[tokio::test]
    async fn test_new_feed_is_empty() {
        let feed = feed(2);

        assert_eq!(feed.state(), FeedState::Empty);
        assert!(feed.items().is_empty());
        assert!(!feed.has_next_page());
        assert_eq!(feed.base_params(), KeyParams::new().with("userId", 1));
    }

    #[tokio::test]
    async fn test_load_until_last_page() {
        let feed = feed(2);

        let first = feed.load_next().await.unwrap();
        assert_eq!(
            first,
            LoadOutcome::Loaded {
                page_number: 0,
                item_count: 2
            }
        );
        assert!(feed.has_next_page());

        feed.load_next().await.unwrap();
        assert_eq!(feed.page_count(), 2);
        assert!(!feed.has_next_page());
        assert_eq!(feed.total_elements(), 4);
        assert_eq!(feed.load_next().await.unwrap(), LoadOutcome::Skipped);
        assert_eq!(feed.state(), FeedState::Ready);
    }

    #[tokio::test]
    async fn test_filtered_by_tag_uses_loaded_items() {
        let feed = feed(3);
        feed.load_first().await.unwrap();

        let rust = feed.filtered_by_tag(Some("rust"));
        assert_eq!(rust, vec![json!({"id": "1-0-a", "tags": ["rust"]})]);
        assert_eq!(feed.filtered_by_tag(None).len(), 2);
        assert!(feed.has_next_page());
    }

    #[tokio::test]
    async fn test_same_params_do_not_reset() {
        let feed = feed(2);
        feed.load_first().await.unwrap();

        let outcome = feed
            .set_base_params(KeyParams::new().with("userId", 1).with("page", 9))
            .await
            .unwrap();

        assert_eq!(outcome, LoadOutcome::Skipped);
        assert_eq!(feed.generation(), 0);
        assert_eq!(feed.page_count(), 1);
    }

    #[tokio::test]
    async fn test_retry_requires_error_state() {
        let feed = feed(1);
        assert_eq!(feed.retry().await.unwrap(), LoadOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_window_is_cached_under_base_key() {
        let feed = feed(2);
        feed.load_first().await.unwrap();

        let store_value = feed.inner.store.peek(&feed.base_key()).unwrap().data.unwrap();
        let window: FeedWindow<Value> = serde_json::from_value(store_value).unwrap();
        assert_eq!(window.page_count(), 1);
    }
}
