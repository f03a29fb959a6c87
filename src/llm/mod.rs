pub mod response;

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use response::ProviderResponse;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Provider capability enabled for one call.
///
/// Web search and JSON-constrained output cannot be combined on the provider,
/// so a call carries exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tooling {
    WebSearch,
    JsonObject,
    FreeForm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallConfig {
    pub tooling: Tooling,
    pub effort: ReasoningEffort,
}

/// Anything that can turn role-tagged messages into a provider response.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, messages: &[Message], config: CallConfig) -> Result<ProviderResponse>;
}

pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl LlmClient {
    pub fn from_env() -> Result<Self> {
        let base_url = dotenv::var("LLM_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let model = dotenv::var("LLM_MODEL").unwrap_or_else(|_| "gpt-5.2".to_string());
        let api_key = dotenv::var("LLM_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| dotenv::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()));
        let timeout_secs = dotenv::var("LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(300);

        Self::new(base_url, model, api_key, Duration::from_secs(timeout_secs))
    }

    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Resolve the responses endpoint from the base URL.
    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/responses") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{}/responses", base)
        } else {
            format!("{}/v1/responses", base)
        }
    }

    fn request_body(&self, messages: &[Message], config: CallConfig) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "input": messages,
            "reasoning": { "effort": config.effort },
            "store": false,
        });

        match config.tooling {
            Tooling::WebSearch => {
                body["tools"] = serde_json::json!([{ "type": "web_search" }]);
            }
            Tooling::JsonObject => {
                body["text"] = serde_json::json!({ "format": { "type": "json_object" } });
            }
            Tooling::FreeForm => {}
        }

        body
    }

    /// Single non-streaming call against the responses endpoint.
    pub async fn respond(
        &self,
        messages: &[Message],
        config: CallConfig,
    ) -> Result<ProviderResponse> {
        let body = self.request_body(messages, config);

        let mut req = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req.send().await.context("LLM request failed")?;
        let status = resp.status();
        let text = resp.text().await.context("Failed to read LLM response")?;

        if !status.is_success() {
            let message = provider_error_message(&text);
            bail!("provider returned {}: {}", status, message);
        }

        let json: serde_json::Value =
            serde_json::from_str(&text).context("Failed to parse LLM JSON")?;
        debug!(?config, body_len = text.len(), "provider response received");

        Ok(ProviderResponse::from_value(json))
    }
}

#[async_trait]
impl Generator for LlmClient {
    async fn generate(&self, messages: &[Message], config: CallConfig) -> Result<ProviderResponse> {
        self.respond(messages, config).await
    }
}

/// Pull `error.message` out of a provider error body, or fall back to the raw body.
fn provider_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "empty response body".to_string()
            } else {
                trimmed.chars().take(500).collect()
            }
        }
    }
}
