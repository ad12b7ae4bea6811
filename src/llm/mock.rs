/// Scripted model client for tests.
///
/// Replies are handed out in order, one per call. Every request is recorded so
/// tests can assert on call counts and prompt contents.
use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ModelCallError, ModelClient, ModelRequest, ModelResponse};
use crate::usage::Usage;

pub struct MockModel {
    model: String,
    replies: Mutex<VecDeque<ModelResponse>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl MockModel {
    /// A mock that returns `replies` in order with zero usage.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_usage(
            replies
                .into_iter()
                .map(|text| (text.into(), Usage::default())),
        )
    }

    /// A mock that returns each `(text, usage)` pair in order.
    pub fn with_usage(replies: impl IntoIterator<Item = (String, Usage)>) -> Self {
        Self {
            model: "claude-3-5-sonnet-latest".to_string(),
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|(text, usage)| ModelResponse { text, usage })
                    .collect(),
            ),
            requests: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn named(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Number of calls made so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Copies of every request received, in call order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ModelClient for MockModel {
    fn model(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, request: &ModelRequest) -> Result<ModelResponse, ModelCallError> {
        let call = {
            let mut requests = self
                .requests
                .lock()
                .map_err(|_| ModelCallError::Malformed("mock request log poisoned".into()))?;
            requests.push(request.clone());
            requests.len()
        };
        self.replies
            .lock()
            .map_err(|_| ModelCallError::Malformed("mock replies poisoned".into()))?
            .pop_front()
            .ok_or_else(|| {
                ModelCallError::Malformed(format!("no scripted response left (call #{call})"))
            })
    }
}
