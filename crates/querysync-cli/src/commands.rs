//! `feed` and `toggle` commands.

use std::sync::Arc;

use anyhow::bail;
use querysync_cache::QueryClient;
use querysync_core::{KeyParams, QueryKey, ServerToggle, ToggleState};
use querysync_feed::{PaginatedFeed, ToggleCoordinator, ToggleOutcome};
use querysync_http::{HttpClient, PagedEndpoint, ToggleEndpoint};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::cli::{FeedArgs, ToggleArgs};

/// Result of a `feed` run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedReport {
    pub pages_loaded: usize,
    pub total_elements: u64,
    pub has_next_page: bool,
    pub items: Vec<Value>,
}

/// Loads up to `args.pages` pages of a list endpoint.
pub async fn run_feed(
    client: &QueryClient,
    http: Arc<dyn HttpClient>,
    default_page_size: u32,
    args: &FeedArgs,
) -> anyhow::Result<FeedReport> {
    let params = args
        .params
        .iter()
        .fold(KeyParams::new(), |params, (name, value)| params.with(name.as_str(), value.clone()));
    let endpoint = PagedEndpoint::new(http, &args.path).page_size(args.page_size.unwrap_or(default_page_size));
    let feed: PaginatedFeed<Value> = PaginatedFeed::new(client, args.path.as_str(), params, endpoint);

    feed.load_first().await?;
    while feed.page_count() < args.pages as usize && feed.has_next_page() {
        feed.load_next().await?;
    }

    let report = FeedReport {
        pages_loaded: feed.page_count(),
        total_elements: feed.total_elements(),
        has_next_page: feed.has_next_page(),
        items: feed.filtered_by_tag(args.tag.as_deref()),
    };
    info!(
        path = %args.path,
        pages = report.pages_loaded,
        items = report.items.len(),
        has_next = report.has_next_page,
        "Feed loaded"
    );
    Ok(report)
}

/// Flips a relationship from the state given on the command line.
pub async fn run_toggle(client: &QueryClient, http: Arc<dyn HttpClient>, args: &ToggleArgs) -> anyhow::Result<ToggleState> {
    let toggles = ToggleCoordinator::new(client);
    let endpoint = ToggleEndpoint::new(http, &args.path);
    let key = QueryKey::new("toggle").with(args.path.as_str());

    toggles.seed(&key, ServerToggle::new(args.active, args.count))?;
    let target = !args.active;
    match toggles.toggle(&key, || endpoint.set(target), []).await? {
        ToggleOutcome::Settled(state) => {
            info!(path = %args.path, is_active = state.is_active, count = state.count, "Toggle settled");
            Ok(state)
        },
        ToggleOutcome::Ignored => bail!("toggle '{}' is already in flight", args.path),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use querysync_cache::RetryPolicy;
    use querysync_core::KeySegment;
    use querysync_http::{HttpError, HttpRequest, HttpResponse};
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct QueuedClient {
        responses: Mutex<VecDeque<HttpResponse>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl QueuedClient {
        fn with(responses: Vec<HttpResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl HttpClient for QueuedClient {
        async fn request(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            self.requests.lock().push(request);
            self.responses
                .lock()
                .pop_front()
                .ok_or_else(|| HttpError::Transport("no response queued".into()))
        }
    }

    fn page(number: u32, last: bool, items: Value) -> HttpResponse {
        HttpResponse::ok(json!({"content": items, "number": number, "last": last, "totalElements": 4}))
    }

    fn client() -> QueryClient {
        let mut config = querysync_cache::CacheConfig::default();
        config.retry = RetryPolicy::none();
        QueryClient::new(config)
    }

    fn feed_args(pages: u32, tag: Option<&str>) -> FeedArgs {
        FeedArgs {
            path: "/posts/user".into(),
            params: vec![("userId".into(), KeySegment::from(9i64))],
            tag: tag.map(String::from),
            pages,
            page_size: None,
        }
    }

    #[tokio::test]
    async fn test_feed_stops_at_requested_pages() {
        let http = QueuedClient::with(vec![
            page(0, false, json!([{"id": 1, "tags": ["rust"]}, {"id": 2, "tags": []}])),
            page(1, false, json!([{"id": 3, "tags": ["rust"]}])),
        ]);

        let report = run_feed(&client(), http.clone(), 2, &feed_args(2, Some("rust"))).await.unwrap();

        assert_eq!(report.pages_loaded, 2);
        assert!(report.has_next_page);
        assert_eq!(report.total_elements, 4);
        assert_eq!(report.items, vec![json!({"id": 1, "tags": ["rust"]}), json!({"id": 3, "tags": ["rust"]})]);
        assert_eq!(http.requests.lock().len(), 2);
        assert!(http.requests.lock()[0].query.contains(&("size".to_string(), "2".to_string())));
    }

    #[tokio::test]
    async fn test_feed_stops_at_last_page() {
        let http = QueuedClient::with(vec![page(0, true, json!([{"id": 1}]))]);

        let report = run_feed(&client(), http.clone(), 12, &feed_args(5, None)).await.unwrap();

        assert_eq!(report.pages_loaded, 1);
        assert!(!report.has_next_page);
        assert_eq!(http.requests.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_flips_current_state() {
        let http = QueuedClient::with(vec![HttpResponse::ok(json!({"isActive": true, "count": 120}))]);
        let args = ToggleArgs {
            path: "/users/5/follow".into(),
            active: false,
            count: 118,
        };

        let state = run_toggle(&client(), http.clone(), &args).await.unwrap();

        assert_eq!(state, ToggleState::new(true, 120));
        assert_eq!(http.requests.lock()[0].method, querysync_http::Method::POST);
    }

    #[tokio::test]
    async fn test_rejected_toggle_fails() {
        let http = QueuedClient::with(vec![HttpResponse::new(404, json!({"message": "no such user"}))]);
        let args = ToggleArgs {
            path: "/users/0/follow".into(),
            active: true,
            count: 1,
        };

        let err = run_toggle(&client(), http, &args).await.unwrap_err();
        assert!(err.to_string().contains("no such user"));
    }
}
