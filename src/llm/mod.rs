/// Model call capability and its provider implementations.
///
/// Core logic only ever sees [`ModelClient`]; which provider sits behind it is
/// decided once, from configuration, by [`build_client`].
pub mod anthropic;
pub mod mock;
pub mod openai;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::usage::Usage;

/// Errors from the model transport. Never retried.
#[derive(Error, Debug)]
pub enum ModelCallError {
    #[error("API key not set: export {0}")]
    MissingApiKey(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("unexpected response format: {0}")]
    Malformed(String),
}

/// One single-turn request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelRequest {
    /// System instruction blocks, in order.
    pub system: Vec<String>,
    /// Auxiliary document blocks sent alongside the system instructions.
    /// Transports that support it cache each block independently.
    pub documents: Vec<String>,
    /// User-turn content.
    pub prompt: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelResponse {
    pub text: String,
    pub usage: Usage,
}

/// A model that answers one request at a time.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Model identifier, used for pricing and metadata.
    fn model(&self) -> &str;

    async fn invoke(&self, request: &ModelRequest) -> Result<ModelResponse, ModelCallError>;
}

/// A response together with how long the round-trip took.
#[derive(Debug, Clone)]
pub struct TimedResponse {
    pub response: ModelResponse,
    pub elapsed: Duration,
}

/// Invoke `client` and measure wall-clock time for the call.
pub async fn invoke_timed(
    client: &dyn ModelClient,
    request: &ModelRequest,
) -> Result<TimedResponse, ModelCallError> {
    let start = Instant::now();
    let response = client.invoke(request).await?;
    Ok(TimedResponse {
        response,
        elapsed: start.elapsed(),
    })
}

/// Supported providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    #[serde(alias = "claude")]
    #[value(alias = "claude")]
    Anthropic,
    #[value(name = "openai")]
    OpenAi,
}

impl Provider {
    #[must_use]
    pub fn default_api_key_env(self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }

    #[must_use]
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Anthropic => "claude-3-5-sonnet-latest",
            Self::OpenAi => "gpt-4o",
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    /// Same names as the CLI and config file, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as clap::ValueEnum>::from_str(s.trim(), true)
    }
}

/// Build the HTTP client shared by the providers.
pub(crate) fn http_client(timeout: Option<Duration>) -> Result<reqwest::Client, ModelCallError> {
    let mut builder =
        reqwest::Client::builder().user_agent(concat!("raggedy/", env!("CARGO_PKG_VERSION")));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Turn a non-success response into [`ModelCallError::Status`], keeping the body.
pub(crate) async fn check_status(
    resp: reqwest::Response,
) -> Result<reqwest::Response, ModelCallError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ModelCallError::Status { status, body })
}

/// Construct the configured provider's client for `model`.
///
/// Reads the API key from the environment variable named in the config.
pub fn build_client(config: &Config, model: &str) -> Result<Box<dyn ModelClient>, ModelCallError> {
    let key_env = config.api_key_env();
    let api_key = std::env::var(&key_env)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or(ModelCallError::MissingApiKey(key_env))?;
    let timeout = config.request_timeout_secs.map(Duration::from_secs);

    let client: Box<dyn ModelClient> = match config.provider {
        Provider::Anthropic => Box::new(anthropic::AnthropicClient::new(
            model,
            api_key,
            config.api_base.as_deref(),
            timeout,
        )?),
        Provider::OpenAi => Box::new(openai::OpenAiClient::new(
            model,
            api_key,
            config.api_base.as_deref(),
            timeout,
        )?),
    };
    Ok(client)
}
