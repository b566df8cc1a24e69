use async_trait::async_trait;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::{ExecutionPath, Provider, ProviderConfig, ProviderError, ProviderKind, ProviderOutput};

const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RESULTS: u32 = 10;

/// Output format requested from the search service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchFormat {
    Text,
    Json,
    #[default]
    Markdown,
}

impl SearchFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchFormat::Text => "text",
            SearchFormat::Json => "json",
            SearchFormat::Markdown => "markdown",
        }
    }
}

impl std::str::FromStr for SearchFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(SearchFormat::Text),
            "json" => Ok(SearchFormat::Json),
            "markdown" | "md" => Ok(SearchFormat::Markdown),
            _ => Err(format!("Unknown format: {} (expected text, json or markdown)", s)),
        }
    }
}

/// Render a search response for display
pub fn render_search_result(data: &Value, format: SearchFormat) -> String {
    let pretty = || serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());

    match (format, data) {
        (SearchFormat::Json, _) => pretty(),
        (_, Value::String(s)) => s.clone(),
        (SearchFormat::Text, _) => match data.get("text").and_then(Value::as_str) {
            Some(text) => text.to_string(),
            None => pretty(),
        },
        (SearchFormat::Markdown, _) => match data.get("content").and_then(Value::as_str) {
            Some(content) => content.to_string(),
            None => pretty(),
        },
    }
}

/// Technical search over an HTTP endpoint (`o3-mcp`)
pub struct SearchProvider {
    format: SearchFormat,
}

impl SearchProvider {
    pub fn new(format: SearchFormat) -> Self {
        Self { format }
    }

    fn endpoint<'a>(&self, config: &'a ProviderConfig) -> Result<&'a str, ProviderError> {
        config
            .endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .map(|e| e.trim_end_matches('/'))
            .ok_or(ProviderError::NotConfigured("o3.endpoint"))
    }
}

impl Default for SearchProvider {
    fn default() -> Self {
        Self::new(SearchFormat::default())
    }
}

#[async_trait]
impl Provider for SearchProvider {
    fn name(&self) -> &str {
        "O3 MCP"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Search
    }

    async fn execute(
        &self,
        prompt: &str,
        config: &ProviderConfig,
    ) -> Result<ProviderOutput, ProviderError> {
        let endpoint = self.endpoint(config)?;
        let url = format!("{}/search", endpoint);
        debug!(url = %url, format = self.format.as_str(), "Sending search request");

        let start = Instant::now();
        let http = reqwest::Client::builder()
            .timeout(config.timeout.unwrap_or(SEARCH_TIMEOUT))
            .build()?;

        let mut request = http.post(&url).json(&serde_json::json!({
            "query": prompt,
            "format": self.format.as_str(),
            "maxResults": MAX_RESULTS,
            "includeContext": true,
        }));
        if let Some(key) = config.api_key.as_deref() {
            request = request.bearer_auth(key);
        }

        let data: Value = request.send().await?.error_for_status()?.json().await?;

        Ok(ProviderOutput::new(
            render_search_result(&data, self.format),
            ExecutionPath::Api,
            start.elapsed(),
        )
        .with_record(data.to_string()))
    }
}
