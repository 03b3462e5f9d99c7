//! Shared HTTP client for OpenAI-compatible endpoints.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use curator_shared::{CuratorError, OpenAiConfig, Result, resolve_api_key};

use crate::retry::RetryPolicy;

const USER_AGENT: &str = concat!("curator/", env!("CARGO_PKG_VERSION"));

/// Bearer-authenticated JSON client with timeout and retry.
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    base: Url,
    api_key: String,
    retry: RetryPolicy,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig, api_key: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| CuratorError::config(format!("failed to build HTTP client: {e}")))?;

        // A base without a trailing slash would drop its last segment on join.
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base)
            .map_err(|e| CuratorError::config(format!("invalid openai.base_url {base:?}: {e}")))?;

        Ok(Self {
            http,
            base,
            api_key: api_key.into(),
            retry: RetryPolicy::from_config(config),
        })
    }

    /// Build a client with the key read from `config.api_key_env`.
    pub fn from_config(config: &OpenAiConfig) -> Result<Self> {
        let key = resolve_api_key(config)?;
        Self::new(config, key)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// POST `body` to `path` under the base URL, retrying transient failures.
    pub async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let url = self
            .base
            .join(path)
            .map_err(|e| CuratorError::config(format!("invalid endpoint {path}: {e}")))?;
        self.retry.run(path, || self.post_once(&url, body)).await
    }

    async fn post_once<T: DeserializeOwned>(&self, url: &Url, body: &Value) -> Result<T> {
        debug!(%url, "POST");
        let response = self
            .http
            .post(url.as_str())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| classify_transport(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_status(url, status, &detail));
        }

        let text = response
            .text()
            .await
            .map_err(|e| CuratorError::Transient(format!("{url}: body read failed: {e}")))?;
        serde_json::from_str(&text).map_err(|e| CuratorError::data(format!("{url}: unexpected response: {e}")))
    }
}

fn classify_transport(url: &Url, e: reqwest::Error) -> CuratorError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        CuratorError::Transient(format!("{url}: {e}"))
    } else {
        CuratorError::Service(format!("{url}: {e}"))
    }
}

fn classify_status(url: &Url, status: StatusCode, detail: &str) -> CuratorError {
    let message = error_message(detail).unwrap_or_else(|| detail.chars().take(200).collect());
    let text = format!("{url}: HTTP {status}: {message}");
    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::REQUEST_TIMEOUT || status.is_server_error() {
        CuratorError::Transient(text)
    } else {
        CuratorError::Service(text)
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body).ok().map(|b| b.error.message)
}

// ---------------------------------------------------------------------------
// Chat completion wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// Content of the first choice, or a data error when there is none.
    pub fn into_content(self) -> Result<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CuratorError::data("chat completion returned no content"))
    }
}
