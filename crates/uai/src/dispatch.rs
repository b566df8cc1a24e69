use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::{debug, warn};

use uai_capture::{run_interactive, terminal_size, CaptureError, CaptureReport, LaunchSpec};
use uai_logging::{LogEvent, Logger};
use uai_providers::api::AnthropicClient;
use uai_providers::{
    ClaudeCodeProvider, Provider, ProviderConfig, ProviderKind, ProviderOutput,
};
use uai_sessions::{Role, SessionRegistry, SessionStore};

use crate::config::UaiConfig;
use crate::repl::run_api_repl;

/// Build the per-invocation provider settings from the user's config.
pub fn provider_config(kind: ProviderKind, project: &Path, config: &UaiConfig) -> ProviderConfig {
    let base = ProviderConfig::new(project.to_path_buf());
    match kind {
        ProviderKind::ClaudeCode => base
            .with_model(config.claude.model.clone())
            .with_api_key(config.claude.api_key.clone()),
        ProviderKind::Search => base
            .with_endpoint(config.o3.endpoint.clone())
            .with_api_key(config.o3.api_key.clone()),
        ProviderKind::Gemini => base
            .with_model(config.gemini.model.clone())
            .with_api_key(config.gemini.api_key.clone()),
    }
}

/// Owns the session registry for one CLI invocation and routes prompts
/// to providers.
pub struct Dispatcher {
    registry: SessionRegistry,
    config: UaiConfig,
    logger: Logger,
}

impl Dispatcher {
    pub fn new(store: SessionStore, config: UaiConfig, logger: Logger) -> Self {
        Self {
            registry: SessionRegistry::new(store),
            config,
            logger,
        }
    }

    pub fn config(&self) -> &UaiConfig {
        &self.config
    }

    fn record(&self, session_id: &str, role: Role, content: &str) {
        if let Err(e) = self.registry.append(session_id, role, content) {
            self.logger.log(&LogEvent::PersistenceWarning {
                session_id: session_id.to_string(),
                error: e.to_string(),
            });
        }
    }

    fn finish(&self, session_id: &str) {
        if let Err(e) = self.registry.close(session_id) {
            warn!(session_id, error = %e, "Failed to close session");
        }
    }

    /// Run one prompt to completion and record it as a two-message session.
    ///
    /// Failed or interrupted runs leave a closed session with no messages.
    pub async fn run_headless(
        &self,
        provider: &dyn Provider,
        prompt: &str,
        config: &ProviderConfig,
    ) -> Result<ProviderOutput> {
        let tool = provider.kind().tag();
        let session_id = self
            .registry
            .open(tool, &config.working_dir.display().to_string())
            .context("Failed to create session")?;

        self.logger.log(&LogEvent::SessionStarted {
            tool: provider.name().to_string(),
            session_id: session_id.clone(),
            project_path: config.working_dir.clone(),
            interactive: false,
        });

        let result = tokio::select! {
            result = provider.execute(prompt, config) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };

        let output = match result {
            Some(Ok(output)) => output,
            Some(Err(e)) => {
                self.finish(&session_id);
                self.logger.log(&LogEvent::ProviderFailed {
                    tool: provider.name().to_string(),
                    error: e.to_string(),
                });
                return Err(e).with_context(|| format!("{} failed", provider.name()));
            }
            None => {
                self.finish(&session_id);
                anyhow::bail!("Interrupted");
            }
        };

        if let Some(reason) = &output.fallback_reason {
            self.logger.log(&LogEvent::ProviderFallback {
                tool: provider.name().to_string(),
                reason: reason.clone(),
            });
        }

        self.record(&session_id, Role::User, prompt);
        self.record(&session_id, Role::Assistant, output.recorded_content());
        self.finish(&session_id);

        debug!(session_id = %session_id, path = ?output.path, "Headless run recorded");
        Ok(output)
    }

    /// Interactive Claude Code session: the real CLI under transcript
    /// capture, or an API chat loop when the CLI cannot be started.
    pub async fn run_interactive_claude(&self, project: &Path) -> Result<()> {
        let project_str = project.display().to_string();
        let session_id = self
            .registry
            .open(ProviderKind::ClaudeCode.tag(), &project_str)
            .context("Failed to create session")?;

        self.logger.log(&LogEvent::SessionStarted {
            tool: "Claude Code".to_string(),
            session_id: session_id.clone(),
            project_path: project.to_path_buf(),
            interactive: true,
        });

        let result = self.capture_claude(project, &session_id).await;
        if let Err(e) = result {
            self.finish(&session_id);
            return Err(e);
        }

        self.finish(&session_id);

        let stats = self.registry.stats(&session_id);
        self.logger.log(&LogEvent::SessionSummary {
            session_id: session_id.clone(),
            message_count: stats.message_count,
            duration: stats.duration,
        });
        print_suggestions();
        Ok(())
    }

    async fn capture_claude(&self, project: &Path, session_id: &str) -> Result<()> {
        let attempt = match ClaudeCodeProvider::new().interactive_binary() {
            Some(binary) => {
                let (cols, rows) = terminal_size();
                let spec = LaunchSpec::new(binary, project).with_size(cols, rows);
                Some(run_interactive(&spec, &self.registry, session_id).await)
            }
            None => None,
        };

        let reason = match route_interactive(attempt) {
            InteractiveRoute::Done(report) => {
                self.report_capture(session_id, &report);
                return Ok(());
            }
            InteractiveRoute::Abort(e) => return Err(e).context("Interactive session failed"),
            InteractiveRoute::ApiChat { reason } => reason,
        };

        self.logger.log(&LogEvent::ProviderFallback {
            tool: "Claude Code".to_string(),
            reason: format!("{}; using the API chat", reason),
        });

        let client = api_chat_client(&self.config)?;
        run_api_repl(
            &client,
            &project.display().to_string(),
            &self.registry,
            session_id,
            &self.logger,
        )
        .await
    }

    fn report_capture(&self, session_id: &str, report: &CaptureReport) {
        self.logger.log(&LogEvent::CaptureFinished {
            session_id: session_id.to_string(),
            interrupted: report.interrupted(),
            exit_code: report.exit_code(),
        });
        if report.persistence_errors > 0 {
            self.logger.log(&LogEvent::PersistenceWarning {
                session_id: session_id.to_string(),
                error: format!("{} message(s) could not be saved", report.persistence_errors),
            });
        }
    }
}

/// Where an interactive Claude session continues after trying the CLI
#[derive(Debug)]
enum InteractiveRoute {
    /// The CLI ran under capture
    Done(CaptureReport),
    /// The CLI is missing or could not be started
    ApiChat { reason: String },
    Abort(CaptureError),
}

/// `attempt` is `None` when no CLI is installed.
fn route_interactive(attempt: Option<uai_capture::Result<CaptureReport>>) -> InteractiveRoute {
    match attempt {
        None => InteractiveRoute::ApiChat {
            reason: "claude CLI not found".to_string(),
        },
        Some(Ok(report)) => InteractiveRoute::Done(report),
        Some(Err(e @ CaptureError::LaunchFailure { .. })) => InteractiveRoute::ApiChat {
            reason: e.to_string(),
        },
        Some(Err(e)) => InteractiveRoute::Abort(e),
    }
}

fn api_chat_client(config: &UaiConfig) -> Result<AnthropicClient> {
    let api_key = config.claude.api_key.clone().context(
        "Claude API key is not configured. Run `uai config set claude.apiKey=<key>` or set ANTHROPIC_API_KEY",
    )?;
    Ok(AnthropicClient::new(api_key, config.claude.model.clone())?)
}

fn print_suggestions() {
    println!();
    println!("{}", "Next steps:".bright_cyan());
    println!("  {} Research a topic      {}", "🔍", "uai o3 \"<topic>\"".dimmed());
    println!("  {} Explore a UI idea     {}", "🎨", "uai gemini \"<idea>\"".dimmed());
    println!("  {} Review this session   {}", "📊", "uai sessions list".dimmed());
}
