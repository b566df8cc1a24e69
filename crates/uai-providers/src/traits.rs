use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::ProviderOutput;

/// Errors that can occur while running a provider
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to launch {binary}: {source}")]
    LaunchFailed {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Provider timed out after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: set {0}")]
    NotConfigured(&'static str),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Provider execution failed: {0}")]
    ExecutionFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    /// Whether a non-interactive fallback path is worth trying.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProviderError::LaunchFailed { .. } | ProviderError::Timeout(_)
        )
    }
}

/// Configuration for one provider invocation
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Working directory for spawned tools
    pub working_dir: PathBuf,
    /// Optional timeout (None = no limit)
    pub timeout: Option<Duration>,
    /// Additional environment variables
    pub env_vars: HashMap<String, String>,
    /// Model to use (if the provider supports it)
    pub model: Option<String>,
    /// API key for HTTP integrations
    pub api_key: Option<String>,
    /// Service endpoint for HTTP integrations
    pub endpoint: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            timeout: None,
            env_vars: HashMap::new(),
            model: None,
            api_key: None,
            endpoint: None,
        }
    }
}

impl ProviderConfig {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_env(mut self, key: String, value: String) -> Self {
        self.env_vars.insert(key, value);
        self
    }
}

/// Supported providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    ClaudeCode,
    Search,
    Gemini,
}

impl ProviderKind {
    /// Tag recorded as the session's `tool`
    pub fn tag(&self) -> &'static str {
        match self {
            ProviderKind::ClaudeCode => "claude-code",
            ProviderKind::Search => "o3-mcp",
            ProviderKind::Gemini => "gemini-cli",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "claude" | "claude-code" | "claudecode" => Ok(ProviderKind::ClaudeCode),
            "o3" | "o3-mcp" | "search" => Ok(ProviderKind::Search),
            "gemini" | "gemini-cli" => Ok(ProviderKind::Gemini),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// A single-shot integration with one external AI tool
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable name (e.g., "Claude Code")
    fn name(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    /// Run one prompt to completion, falling back to an alternate
    /// integration path where the provider has one
    async fn execute(
        &self,
        prompt: &str,
        config: &ProviderConfig,
    ) -> Result<ProviderOutput, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_aliases() {
        assert_eq!("claude".parse::<ProviderKind>().unwrap(), ProviderKind::ClaudeCode);
        assert_eq!("O3".parse::<ProviderKind>().unwrap(), ProviderKind::Search);
        assert_eq!("gemini-cli".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert!("gpt".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_provider_kind_tags() {
        assert_eq!(ProviderKind::ClaudeCode.to_string(), "claude-code");
        assert_eq!(ProviderKind::Search.tag(), "o3-mcp");
        assert_eq!(ProviderKind::Gemini.tag(), "gemini-cli");
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(ProviderError::Timeout(Duration::from_secs(30)).is_recoverable());
        assert!(!ProviderError::NotConfigured("o3.endpoint").is_recoverable());
    }
}
