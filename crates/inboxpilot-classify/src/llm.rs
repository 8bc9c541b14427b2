//! Minimal multi-provider LLM client.
//!
//! Supports the **OpenAI Chat Completions API** (including OpenAI-compatible
//! endpoints such as Ollama, Together, and vLLM) and the **Anthropic
//! Messages API**, non-streaming only: classification needs one short JSON
//! reply per call, so the streaming machinery was left out.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{ClassifyError, ClassifyResult};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default OpenAI API base URL.
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default Anthropic API base URL.
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Request timeout. Classification is a single short completion; anything
/// slower than this is treated as a transient failure and falls back.
const REQUEST_TIMEOUT_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Provider enum
// ---------------------------------------------------------------------------

/// Identifies which LLM provider the client should target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// OpenAI Chat Completions API (also covers OpenAI-compatible endpoints).
    OpenAI,
    /// Anthropic Messages API.
    Anthropic,
}

// ---------------------------------------------------------------------------
// Client configuration
// ---------------------------------------------------------------------------

/// Configuration for connecting to a single LLM provider endpoint.
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    /// Which provider this configuration targets.
    pub provider: LlmProvider,
    /// API key for authentication.
    pub api_key: String,
    /// Base URL for the API (e.g. `https://api.openai.com/v1`).
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Maximum tokens per reply.
    pub max_tokens: u32,
}

impl LlmClientConfig {
    /// Create a configuration for the OpenAI API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_owned(),
            model: model.into(),
            max_tokens: 1024,
        }
    }

    /// Create a configuration for any OpenAI-compatible API (e.g. Ollama,
    /// Together, vLLM).
    pub fn openai_compatible(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            max_tokens: 1024,
        }
    }

    /// Create a configuration for the Anthropic Claude API.
    pub fn anthropic(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::Anthropic,
            api_key: api_key.into(),
            base_url: ANTHROPIC_BASE_URL.to_owned(),
            model: model.into(),
            max_tokens: 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// An LLM client that sends one system + one user message and returns the
/// reply text.
#[derive(Debug, Clone)]
pub struct LlmClient {
    config: LlmClientConfig,
    http: reqwest::Client,
}

impl LlmClient {
    /// Create a new client with the given configuration.
    pub fn new(config: LlmClientConfig) -> ClassifyResult<Self> {
        if config.api_key.is_empty() {
            let provider = match config.provider {
                LlmProvider::OpenAI => "openai",
                LlmProvider::Anthropic => "anthropic",
            };
            return Err(ClassifyError::MissingApiKey {
                provider: provider.into(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ClassifyError::RequestFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { config, http })
    }

    /// Send a system + user message pair and return the reply text.
    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f64,
    ) -> ClassifyResult<String> {
        match self.config.provider {
            LlmProvider::OpenAI => self.complete_openai(system, user, temperature).await,
            LlmProvider::Anthropic => self.complete_anthropic(system, user, temperature).await,
        }
    }

    // -- OpenAI -------------------------------------------------------------

    async fn complete_openai(
        &self,
        system: &str,
        user: &str,
        temperature: f64,
    ) -> ClassifyResult<String> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        debug!(model = %self.config.model, "sending chat completion request");

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.config.api_key)).map_err(|e| {
                ClassifyError::RequestFailed {
                    reason: format!("invalid authorization header: {e}"),
                }
            })?,
        );

        let v = self.post_json(&url, headers, &body).await?;
        parse_openai_text(&v)
    }

    // -- Anthropic ----------------------------------------------------------

    async fn complete_anthropic(
        &self,
        system: &str,
        user: &str,
        temperature: f64,
    ) -> ClassifyResult<String> {
        let url = format!("{}/v1/messages", self.config.base_url);
        let body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": temperature,
            "system": system,
            "messages": [
                { "role": "user", "content": user },
            ],
        });

        debug!(model = %self.config.model, "sending messages request");

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.config.api_key).map_err(|e| {
                ClassifyError::RequestFailed {
                    reason: format!("invalid api key header: {e}"),
                }
            })?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let v = self.post_json(&url, headers, &body).await?;
        parse_anthropic_text(&v)
    }

    // -- Shared HTTP plumbing -----------------------------------------------

    async fn post_json(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &Value,
    ) -> ClassifyResult<Value> {
        let resp = self
            .http
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| ClassifyError::RequestFailed {
                reason: format!("request to {url} failed: {e}"),
            })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ClassifyError::RequestFailed {
                reason: format!("failed to read response body: {e}"),
            })?;

        if !status.is_success() {
            return Err(ClassifyError::ApiError {
                status: status.as_u16(),
                body: text,
            });
        }

        let v: Value = serde_json::from_str(&text)?;
        Ok(v)
    }
}

// ---------------------------------------------------------------------------
// Response parsing (free functions)
// ---------------------------------------------------------------------------

/// Pull the reply text out of a Chat Completions response.
fn parse_openai_text(v: &Value) -> ClassifyResult<String> {
    v["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| ClassifyError::UnparsableReply {
            reason: "missing `choices[0].message.content` in response".into(),
        })
}

/// Pull the reply text out of an Anthropic Messages response, joining all
/// text content blocks.
fn parse_anthropic_text(v: &Value) -> ClassifyResult<String> {
    let content = v["content"]
        .as_array()
        .ok_or_else(|| ClassifyError::UnparsableReply {
            reason: "missing `content` array in response".into(),
        })?;

    let text: String = content
        .iter()
        .filter(|block| block["type"].as_str() == Some("text"))
        .filter_map(|block| block["text"].as_str())
        .collect();

    Ok(text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
