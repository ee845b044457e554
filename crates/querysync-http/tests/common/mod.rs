#![allow(dead_code)]
use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use querysync_http::{HttpClient, HttpError, HttpRequest, HttpResponse};
use serde_json::{Value, json};

/// Replays queued responses and records every request.
#[derive(Default)]
pub struct MockHttpClient {
    responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockHttpClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, status: u16, data: Value) -> &Self {
        self.responses
            .lock()
            .push_back(Ok(HttpResponse::new(status, data)));
        self
    }

    pub fn fail(&self, error: HttpError) -> &Self {
        self.responses.lock().push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(HttpError::Transport("no response queued".into())))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Body of one page of posts.
pub fn page_body(number: u32, last: bool, ids: &[i64]) -> Value {
    let content: Vec<Value> = ids.iter().map(|id| json!({"id": id, "tags": ["rust"]})).collect();
    json!({"content": content, "number": number, "last": last, "totalElements": 5})
}
