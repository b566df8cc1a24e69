use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Instant;
use tracing::debug;

use crate::api::{coding_system_prompt, AnthropicClient, ChatTurn};
use crate::{
    locate_binary, ExecutionPath, Provider, ProviderConfig, ProviderError, ProviderKind,
    ProviderOutput,
};

/// Claude Code provider.
///
/// Single prompts go to the Messages API. The `claude` CLI is only used for
/// interactive sessions, which the caller launches through
/// [`ClaudeCodeProvider::interactive_binary`].
pub struct ClaudeCodeProvider {
    binary_name: String,
}

impl ClaudeCodeProvider {
    pub fn new() -> Self {
        Self {
            binary_name: "claude".to_string(),
        }
    }

    pub fn with_binary_name(name: impl Into<String>) -> Self {
        Self {
            binary_name: name.into(),
        }
    }

    /// Path of the CLI used for interactive sessions, if installed
    pub fn interactive_binary(&self) -> Option<PathBuf> {
        locate_binary(&self.binary_name)
    }
}

impl Default for ClaudeCodeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for ClaudeCodeProvider {
    fn name(&self) -> &str {
        "Claude Code"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::ClaudeCode
    }

    async fn execute(
        &self,
        prompt: &str,
        config: &ProviderConfig,
    ) -> Result<ProviderOutput, ProviderError> {
        debug!(provider = self.name(), prompt_len = prompt.len(), "Executing prompt");

        let api_key = config
            .api_key
            .clone()
            .ok_or(ProviderError::NotConfigured("claude.apiKey"))?;
        let client = AnthropicClient::new(api_key, config.model.clone())?;

        let start = Instant::now();
        let system = coding_system_prompt(&config.working_dir.display().to_string());
        let text = client.send(&[ChatTurn::user(prompt)], &system).await?;

        Ok(ProviderOutput::new(text, ExecutionPath::Api, start.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prompt_without_api_key_is_not_configured() {
        let provider = ClaudeCodeProvider::new();
        let config = ProviderConfig::new(std::env::temp_dir());

        let err = provider.execute("hello", &config).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured("claude.apiKey")));
    }

    #[tokio::test]
    async fn test_prompt_never_runs_the_cli() {
        // A "claude" that would succeed must not be consulted
        let provider = ClaudeCodeProvider::with_binary_name("true");
        let config = ProviderConfig::new(std::env::temp_dir());

        let err = provider.execute("hello", &config).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured("claude.apiKey")));
    }

    #[test]
    fn test_missing_cli_has_no_interactive_binary() {
        let provider = ClaudeCodeProvider::with_binary_name("uai-no-such-claude-cli");
        assert!(provider.interactive_binary().is_none());
    }
}
