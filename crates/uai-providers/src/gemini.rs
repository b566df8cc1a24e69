use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::api::GeminiClient;
use crate::{
    locate_binary, ExecutionPath, ProcessOutput, ProcessSpawner, Provider, ProviderConfig,
    ProviderError, ProviderKind, ProviderOutput,
};

const CLI_TIMEOUT: Duration = Duration::from_secs(30);

/// What to do with the result of a gemini CLI run
#[derive(Debug, PartialEq, Eq)]
pub enum CliVerdict {
    Accept(String),
    FallBack(String),
    Fail(String),
}

/// Classify a CLI attempt. Launch failures, timeouts and argument
/// rejections by older CLI versions all go to the REST API.
pub fn classify_cli_result(result: Result<ProcessOutput, ProviderError>) -> CliVerdict {
    match result {
        Ok(output) if output.success() || (output.exit_code == -1 && !output.stdout.is_empty()) => {
            CliVerdict::Accept(output.stdout.trim().to_string())
        }
        Ok(output) if output.stderr.contains("Unknown argument") => {
            CliVerdict::FallBack(format!("gemini CLI rejected arguments: {}", output.stderr.trim()))
        }
        Ok(output) => CliVerdict::Fail(if output.stderr.trim().is_empty() {
            format!("Exit code: {}", output.exit_code)
        } else {
            output.stderr.trim().to_string()
        }),
        Err(e) if e.is_recoverable() => CliVerdict::FallBack(e.to_string()),
        Err(e) => CliVerdict::Fail(e.to_string()),
    }
}

/// Gemini provider: the `gemini` CLI with the `generateContent` API as fallback
pub struct GeminiProvider {
    binary_name: String,
}

impl GeminiProvider {
    pub fn new() -> Self {
        Self {
            binary_name: "gemini".to_string(),
        }
    }

    pub fn with_binary_name(name: impl Into<String>) -> Self {
        Self {
            binary_name: name.into(),
        }
    }

    async fn execute_via_api(
        &self,
        prompt: &str,
        config: &ProviderConfig,
        reason: String,
    ) -> Result<ProviderOutput, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(ProviderError::NotConfigured("gemini.apiKey"))?;
        let client = GeminiClient::new(api_key, config.model.clone())?;

        let start = Instant::now();
        let text = client.generate(prompt).await?;
        Ok(ProviderOutput::new(text, ExecutionPath::Api, start.elapsed()).with_fallback_reason(reason))
    }
}

impl Default for GeminiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "Gemini CLI"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn execute(
        &self,
        prompt: &str,
        config: &ProviderConfig,
    ) -> Result<ProviderOutput, ProviderError> {
        let Some(binary) = locate_binary(&self.binary_name) else {
            return self
                .execute_via_api(prompt, config, format!("{} CLI not found", self.binary_name))
                .await;
        };

        let mut args = Vec::new();
        if let Some(model) = config.model.as_deref() {
            args.push("--model");
            args.push(model);
        }
        args.extend(["--prompt", prompt, "--yolo"]);

        let mut cli_config = config.clone();
        cli_config.timeout = Some(config.timeout.unwrap_or(CLI_TIMEOUT));
        if let Some(key) = config.api_key.clone() {
            cli_config = cli_config.with_env("GOOGLE_API_KEY".to_string(), key);
        }

        debug!(binary = %binary.display(), "Running gemini CLI");
        let result = ProcessSpawner::spawn(&binary, &args, &cli_config, Some(prompt)).await;
        let duration = result.as_ref().map(|o| o.duration).unwrap_or_default();

        match classify_cli_result(result) {
            CliVerdict::Accept(content) => {
                Ok(ProviderOutput::new(content, ExecutionPath::Cli, duration))
            }
            CliVerdict::FallBack(reason) => {
                warn!(reason = %reason, "Falling back to Gemini API");
                self.execute_via_api(prompt, config, reason).await
            }
            CliVerdict::Fail(message) => Err(ProviderError::ExecutionFailed(message)),
        }
    }
}
