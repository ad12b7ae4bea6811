/// Anthropic Messages API client.
///
/// Auxiliary documents become separate system blocks with cache breakpoints,
/// so repeated questions over the same documents hit the prompt cache.
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{ModelCallError, ModelClient, ModelRequest, ModelResponse, check_status, http_client};
use crate::usage::Usage;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// The API rejects requests with more cache breakpoints than this.
pub const MAX_CACHE_BREAKPOINTS: usize = 4;

pub struct AnthropicClient {
    client: reqwest::Client,
    model: String,
    api_key: String,
    base_url: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: ApiUsage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    input_tokens: u64,
    output_tokens: u64,
    #[serde(default)]
    cache_read_input_tokens: Option<u64>,
    #[serde(default)]
    cache_creation_input_tokens: Option<u64>,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        let cache_read = u.cache_read_input_tokens.unwrap_or(0);
        Self {
            // Anthropic reports cache hits separately from input_tokens
            input_tokens: u.input_tokens + cache_read,
            output_tokens: u.output_tokens,
            cache_read_tokens: cache_read,
            cache_write_tokens: u.cache_creation_input_tokens.unwrap_or(0),
        }
    }
}

impl AnthropicClient {
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
        let mut system: Vec<Value> = request
            .system
            .iter()
            .map(|text| json!({ "type": "text", "text": text }))
            .collect();

        // Breakpoints go on the trailing documents so the longest prefix is cached.
        let first_cached = request
            .documents
            .len()
            .saturating_sub(MAX_CACHE_BREAKPOINTS);
        for (i, doc) in request.documents.iter().enumerate() {
            let mut block = json!({ "type": "text", "text": doc });
            if i >= first_cached {
                block["cache_control"] = json!({ "type": "ephemeral" });
            }
            system.push(block);
        }

        let mut body = json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "messages": [{ "role": "user", "content": request.prompt }],
        });
        if !system.is_empty() {
            body["system"] = Value::Array(system);
        }
        body
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, request: &ModelRequest) -> Result<ModelResponse, ModelCallError> {
        let url = format!("{}/v1/messages", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.build_body(request))
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let parsed: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| ModelCallError::Malformed(e.to_string()))?;

        let text = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        let usage = Usage::from(parsed.usage);
        debug!(model = %self.model, ?usage, "anthropic call complete");

        Ok(ModelResponse { text, usage })
    }
}
