use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// User-facing events emitted while dispatching a prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    SessionStarted {
        tool: String,
        session_id: String,
        project_path: PathBuf,
        interactive: bool,
    },
    /// The preferred integration path was unavailable and another one runs
    ProviderFallback {
        tool: String,
        reason: String,
    },
    ProviderFailed {
        tool: String,
        error: String,
    },
    CaptureFinished {
        session_id: String,
        interrupted: bool,
        exit_code: Option<i32>,
    },
    SessionSummary {
        session_id: String,
        message_count: usize,
        duration: String,
    },
    /// A session write failed but the interaction carried on
    PersistenceWarning {
        session_id: String,
        error: String,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for uai events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        let line = match self.format {
            LogFormat::Json => serde_json::to_string(event).ok(),
            LogFormat::Pretty => Some(Self::render_pretty(event)),
            LogFormat::Compact => Some(Self::render_compact(event)),
        };
        if let Some(line) = line {
            let _ = writeln!(std::io::stderr(), "{}", line);
        }
    }

    fn render_pretty(event: &LogEvent) -> String {
        match event {
            LogEvent::SessionStarted {
                tool,
                project_path,
                interactive,
                ..
            } => {
                let mode = if *interactive {
                    "interactive session"
                } else {
                    "running"
                };
                format!(
                    "{} {} {}\n  {} {}",
                    "▶".bright_blue(),
                    tool.bright_cyan().bold(),
                    mode.dimmed(),
                    "Project:".dimmed(),
                    project_path.display().to_string().dimmed()
                )
            }
            LogEvent::ProviderFallback { tool, reason } => format!(
                "{} {}: {}",
                "⚠".bright_yellow(),
                tool.bright_yellow(),
                reason
            ),
            LogEvent::ProviderFailed { tool, error } => format!(
                "{} {} failed: {}",
                "✗".bright_red(),
                tool,
                error.bright_red()
            ),
            LogEvent::CaptureFinished {
                interrupted,
                exit_code,
                ..
            } => {
                if *interrupted {
                    format!("\n{} Interrupted", "■".bright_yellow())
                } else {
                    match exit_code {
                        Some(0) | None => format!("\n{} Session ended", "✓".bright_green()),
                        Some(code) => format!("\n{} Session ended (exit {})", "✗".bright_red(), code),
                    }
                }
            }
            LogEvent::SessionSummary {
                session_id,
                message_count,
                duration,
            } => format!(
                "{}\n  {} {}\n  {} {}\n  {} {}",
                "Session stats:".bright_blue(),
                "Duration:".dimmed(),
                duration,
                "Messages:".dimmed(),
                message_count,
                "Session ID:".dimmed(),
                session_id.dimmed()
            ),
            LogEvent::PersistenceWarning { error, .. } => format!(
                "{} {}",
                "⚠ Failed to save session:".bright_yellow(),
                error
            ),
        }
    }

    fn render_compact(event: &LogEvent) -> String {
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        match event {
            LogEvent::SessionStarted {
                tool, session_id, ..
            } => format!("[{}] session:start {} {}", timestamp, tool, session_id),
            LogEvent::ProviderFallback { tool, reason } => {
                format!("[{}] fallback:{} {}", timestamp, tool, reason)
            }
            LogEvent::ProviderFailed { tool, error } => {
                format!("[{}] error:{} {}", timestamp, tool, error)
            }
            LogEvent::CaptureFinished {
                session_id,
                interrupted,
                exit_code,
            } => format!(
                "[{}] capture:done {} interrupted={} exit={}",
                timestamp,
                session_id,
                interrupted,
                exit_code.map_or_else(|| "-".to_string(), |c| c.to_string())
            ),
            LogEvent::SessionSummary {
                session_id,
                message_count,
                duration,
            } => format!(
                "[{}] session:stats {} messages={} duration={}",
                timestamp, session_id, message_count, duration
            ),
            LogEvent::PersistenceWarning { session_id, error } => {
                format!("[{}] persist:warn {} {}", timestamp, session_id, error)
            }
        }
    }
}
