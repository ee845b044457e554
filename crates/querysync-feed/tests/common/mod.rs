#![allow(dead_code)]
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use querysync_core::{FeedPage, KeyParams, QueryError, Result};
use querysync_feed::PageLoader;
use serde_json::{Value, json};
use tokio::sync::Notify;

/// What the loader does for one (params, page) request.
#[derive(Clone)]
pub enum Step {
    /// Resolve with the page.
    Page(FeedPage<Value>),
    /// Fail with the error.
    Fail(QueryError),
    /// Wait for the gate, then resolve with the page.
    Gated(Arc<Notify>, FeedPage<Value>),
}

/// Page loader answering from a script keyed by parameters and page number.
///
/// Each scripted step is consumed once; a request without a step fails with
/// a validation error.
#[derive(Clone, Default)]
pub struct ScriptedLoader {
    steps: Arc<Mutex<HashMap<(String, u32), Vec<Step>>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(&self, params: &KeyParams, page: FeedPage<Value>) -> &Self {
        self.push(params, page.page_number, Step::Page(page))
    }

    /// Answers a request for `request` with `page`, whatever its number.
    pub fn page_at(&self, params: &KeyParams, request: u32, page: FeedPage<Value>) -> &Self {
        self.push(params, request, Step::Page(page))
    }

    pub fn fail(&self, params: &KeyParams, page_number: u32, error: QueryError) -> &Self {
        self.push(params, page_number, Step::Fail(error))
    }

    /// Scripts a page that resolves only once the returned gate is notified.
    pub fn gated(&self, params: &KeyParams, page: FeedPage<Value>) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.push(params, page.page_number, Step::Gated(Arc::clone(&gate), page));
        gate
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn push(&self, params: &KeyParams, page_number: u32, step: Step) -> &Self {
        self.steps
            .lock()
            .entry((params.to_string(), page_number))
            .or_default()
            .push(step);
        self
    }

    fn next_step(&self, params: &KeyParams, page_number: u32) -> Option<Step> {
        let mut steps = self.steps.lock();
        let queue = steps.get_mut(&(params.to_string(), page_number))?;
        if queue.is_empty() {
            None
        } else {
            Some(queue.remove(0))
        }
    }
}

#[async_trait]
impl PageLoader<Value> for ScriptedLoader {
    async fn load_page(&self, params: &KeyParams, page: u32) -> Result<FeedPage<Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_step(params, page) {
            Some(Step::Page(page)) => Ok(page),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Gated(gate, page)) => {
                gate.notified().await;
                Ok(page)
            },
            None => Err(QueryError::validation(format!("no page {page} scripted for {params}"))),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A page of post items named by `ids`, each tagged with `tags`.
pub fn posts(number: u32, last: bool, ids: &[&str], tags: &[&str]) -> FeedPage<Value> {
    let items = ids
        .iter()
        .map(|id| json!({ "id": id, "tags": tags }))
        .collect::<Vec<_>>();
    FeedPage::new(items, number, last, 10)
}

/// Ids of the given items.
pub fn ids(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| item["id"].as_str().map(str::to_string))
        .collect()
}

/// Parameters of a user's post feed.
pub fn user_params(user: i64) -> KeyParams {
    KeyParams::new()
        .with("userId", user)
        .with("postType", "archive")
        .with("size", 12)
}

/// Yields until `condition` holds, at most a few hundred times.
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
}
