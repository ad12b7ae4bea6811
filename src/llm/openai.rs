/// OpenAI Chat Completions client.
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{ModelCallError, ModelClient, ModelRequest, ModelResponse, check_status, http_client};
use crate::usage::Usage;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiClient {
    client: reqwest::Client,
    model: String,
    api_key: String,
    base_url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    #[serde(default)]
    prompt_tokens_details: Option<PromptTokensDetails>,
}

#[derive(Deserialize)]
struct PromptTokensDetails {
    #[serde(default)]
    cached_tokens: u64,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Self {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            cache_read_tokens: u.prompt_tokens_details.map_or(0, |d| d.cached_tokens),
            cache_write_tokens: 0,
        }
    }
}

impl OpenAiClient {
    pub fn new(
        model: &str,
        api_key: String,
        base_url: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Self, ModelCallError> {
        Ok(Self {
            client: http_client(timeout)?,
            model: model.to_string(),
            api_key,
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
        })
    }

    fn build_body(&self, request: &ModelRequest) -> Value {
        // Caching is automatic on this API, so documents are plain system messages.
        let mut messages: Vec<Value> = request
            .system
            .iter()
            .chain(request.documents.iter())
            .map(|text| json!({ "role": "system", "content": text }))
            .collect();
        messages.push(json!({ "role": "user", "content": request.prompt }));

        json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "messages": messages,
        })
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, request: &ModelRequest) -> Result<ModelResponse, ModelCallError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.build_body(request))
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ModelCallError::Malformed(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ModelCallError::Malformed("no message content in choices".into()))?;
        let usage = parsed.usage.map(Usage::from).unwrap_or_default();
        debug!(model = %self.model, ?usage, "openai call complete");

        Ok(ModelResponse { text, usage })
    }
}
