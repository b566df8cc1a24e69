mod config;
mod dispatch;
mod repl;
mod sessions;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use uai_logging::{init_tracing, LogFormat, Logger, LOG_FILE_NAME};
use uai_providers::{
    ClaudeCodeProvider, GeminiProvider, ProviderKind, SearchFormat, SearchProvider,
};
use uai_sessions::SessionStore;

use crate::config::{mask_api_key, parse_assignment, ConfigStore};
use crate::dispatch::{provider_config, Dispatcher};
use crate::sessions::{handle_sessions_command, SessionsAction};

#[derive(Parser, Debug)]
#[command(
    name = "uai",
    about = "One entry point for AI coding tools, with every conversation recorded",
    version,
    author
)]
struct Cli {
    /// Diagnostic log level (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Session directory (default: $UAI_SESSION_DIR or ~/.ai-sessions)
    #[arg(long, global = true)]
    session_dir: Option<PathBuf>,

    /// Also append session events to this file as JSON lines
    #[arg(long, global = true)]
    event_log: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run Claude Code (interactive session when no prompt is given)
    Claude {
        /// Prompt for a single headless run
        prompt: Vec<String>,

        /// Project path (default: current directory)
        #[arg(short, long)]
        project: Option<PathBuf>,

        /// Never start an interactive session
        #[arg(long)]
        no_interactive: bool,
    },

    /// Research a technical topic with the O3 MCP search service
    O3 {
        #[arg(required = true)]
        prompt: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "markdown")]
        format: FormatChoice,
    },

    /// Run a visual or creative task with Gemini CLI
    Gemini {
        #[arg(required = true)]
        prompt: Vec<String>,

        /// Write the result to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Model to use
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Browse and manage recorded sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print one value
    Get { key: String },

    /// Set a value
    Set {
        /// KEY=VALUE, e.g. claude.apiKey=sk-ant-...
        assignment: String,
    },

    /// Show all settings with API keys masked
    List,

    /// Restore the default settings
    Reset,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatChoice {
    Text,
    Json,
    Markdown,
}

impl From<FormatChoice> for SearchFormat {
    fn from(choice: FormatChoice) -> Self {
        match choice {
            FormatChoice::Text => SearchFormat::Text,
            FormatChoice::Json => SearchFormat::Json,
            FormatChoice::Markdown => SearchFormat::Markdown,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_dir = ConfigStore::default_dir()?;
    let log_format: LogFormat = cli.log_format.into();

    // Diagnostics go to a file while the terminal is in raw mode
    let interactive = matches!(
        &cli.command,
        Commands::Claude { prompt, no_interactive: false, .. } if prompt.is_empty()
    );
    let log_dir = interactive.then_some(config_dir.as_path());
    let _log_guard = match init_tracing(&cli.log_level, log_format, log_dir) {
        Ok(guard) => guard,
        Err(e) => {
            // Writing diagnostics to stderr would corrupt the raw-mode terminal
            eprintln!(
                "{} diagnostics disabled, cannot write {}: {}",
                "Warning:".bright_yellow(),
                config_dir.join(LOG_FILE_NAME).display(),
                e
            );
            None
        }
    };
    let event_log = cli.event_log.as_deref();

    let store = match cli.session_dir {
        Some(dir) => SessionStore::with_dir(dir),
        None => SessionStore::new()?,
    };

    match cli.command {
        Commands::Sessions { action } => handle_sessions_command(action, store),
        Commands::Config { action } => handle_config_command(action, &config_dir),
        Commands::Claude {
            prompt,
            project,
            no_interactive,
        } => {
            let project = resolve_project(project)?;
            let dispatcher = build_dispatcher(store, &config_dir, log_format, event_log)?;
            let prompt = prompt.join(" ");

            if prompt.is_empty() {
                if no_interactive {
                    anyhow::bail!("Provide a prompt or drop --no-interactive");
                }
                return dispatcher.run_interactive_claude(&project).await;
            }

            let config = provider_config(ProviderKind::ClaudeCode, &project, dispatcher.config());
            let output = dispatcher
                .run_headless(&ClaudeCodeProvider::new(), &prompt, &config)
                .await?;
            println!("{}", output.content);
            Ok(())
        }
        Commands::O3 { prompt, format } => {
            let project = resolve_project(None)?;
            let dispatcher = build_dispatcher(store, &config_dir, log_format, event_log)?;
            let config = provider_config(ProviderKind::Search, &project, dispatcher.config());

            let output = dispatcher
                .run_headless(&SearchProvider::new(format.into()), &prompt.join(" "), &config)
                .await?;
            println!("{}", output.content);
            Ok(())
        }
        Commands::Gemini {
            prompt,
            output,
            model,
        } => {
            let project = resolve_project(None)?;
            let dispatcher = build_dispatcher(store, &config_dir, log_format, event_log)?;
            let mut config = provider_config(ProviderKind::Gemini, &project, dispatcher.config());
            if model.is_some() {
                config = config.with_model(model);
            }

            let result = dispatcher
                .run_headless(&GeminiProvider::new(), &prompt.join(" "), &config)
                .await?;
            println!("{}", result.content);

            if let Some(path) = output {
                std::fs::write(&path, &result.content)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                eprintln!("{} {}", "Saved to".dimmed(), path.display());
            }
            Ok(())
        }
    }
}

fn build_dispatcher(
    store: SessionStore,
    config_dir: &Path,
    log_format: LogFormat,
    event_log: Option<&Path>,
) -> Result<Dispatcher> {
    let config = ConfigStore::load(config_dir)
        .context("Failed to load configuration")?
        .config()
        .with_env_overlay();

    let logger = match event_log {
        Some(path) => Logger::with_file(log_format, path)
            .with_context(|| format!("Failed to open event log {}", path.display()))?,
        None => Logger::new(log_format),
    };
    Ok(Dispatcher::new(store, config, logger))
}

fn resolve_project(project: Option<PathBuf>) -> Result<PathBuf> {
    match project {
        Some(path) => Ok(path),
        None => std::env::current_dir().context("Failed to get current directory"),
    }
}

fn handle_config_command(action: ConfigAction, config_dir: &Path) -> Result<()> {
    let mut store = ConfigStore::load(config_dir).context("Failed to load configuration")?;

    match action {
        ConfigAction::Get { key } => match store.get(&key)? {
            Some(value) => println!("{}", value),
            None => println!("{}", "(not set)".dimmed()),
        },
        ConfigAction::Set { assignment } => {
            let (key, value) = parse_assignment(&assignment)?;
            let shown = if key.is_secret() {
                mask_api_key(Some(&value))
            } else {
                value.clone()
            };
            store.set(key, value)?;
            println!("{} {} = {}", "✓ Updated".bright_green(), key, shown);
        }
        ConfigAction::List => println!("{}", store.render_list()),
        ConfigAction::Reset => {
            store.reset()?;
            println!("{}", "✓ Configuration reset to defaults".bright_green());
        }
    }

    Ok(())
}
