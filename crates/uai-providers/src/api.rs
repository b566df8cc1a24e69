//! HTTP clients for the fallback integration paths.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::ProviderError;

pub const DEFAULT_CLAUDE_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";

const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const MAX_TOKENS: u32 = 4096;
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

fn http_client() -> Result<reqwest::Client, ProviderError> {
    Ok(reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?)
}

/// One turn of a chat conversation sent to the Messages API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// System prompt used for API-backed coding sessions
pub fn coding_system_prompt(project_path: &str) -> String {
    format!(
        "You are Claude Code, an AI assistant helping with coding tasks in the project at {}.\n\
         Current working directory: {}\n\
         Provide helpful, concise responses focused on the task at hand.",
        project_path, project_path
    )
}

/// Minimal Anthropic Messages API client
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl AnthropicClient {
    pub fn new(api_key: String, model: Option<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            http: http_client()?,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_CLAUDE_MODEL.to_string()),
        })
    }

    pub async fn send(&self, turns: &[ChatTurn], system: &str) -> Result<String, ProviderError> {
        debug!(model = %self.model, turns = turns.len(), "Calling Anthropic Messages API");

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": system,
            "messages": turns,
        });

        let response = self
            .http
            .post(ANTHROPIC_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let value: Value = response.json().await?;
        extract_anthropic_text(&value)
    }
}

/// Concatenate the text blocks of a Messages API response
pub fn extract_anthropic_text(value: &Value) -> Result<String, ProviderError> {
    let blocks = value
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::InvalidResponse("missing content blocks".to_string()))?;

    Ok(blocks
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|b| b.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join(""))
}

/// Minimal Gemini `generateContent` client
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: Option<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            http: http_client()?,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
        })
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        debug!(model = %self.model, "Calling Gemini generateContent");

        let url = format!("{}/{}:generateContent", GEMINI_BASE_URL, self.model);
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let value: Value = response.json().await?;
        extract_gemini_text(&value)
    }
}

/// Text of the first candidate's first part
pub fn extract_gemini_text(value: &Value) -> Result<String, ProviderError> {
    value
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ProviderError::InvalidResponse("missing candidate text".to_string()))
}
