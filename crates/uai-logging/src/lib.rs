//! # uai-logging
//!
//! Logging for the uai dispatcher.
//!
//! ## Key Types
//!
//! - [`Logger`] - User-facing event rendering on stderr
//! - [`LogEvent`] - Log event types
//! - [`LogFormat`] - Output formats (Pretty, JSON, Compact)
//!
//! Diagnostics go through `tracing`; [`init_tracing`] installs the subscriber.

mod events;

pub use events::{LogEvent, LogFormat, Logger};

use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// File name used when diagnostics are redirected to a log directory.
pub const LOG_FILE_NAME: &str = "uai.log";

/// Create `dir` if needed and open `LOG_FILE_NAME` in it for appending.
pub fn open_log_appender(dir: &Path) -> io::Result<RollingFileAppender> {
    std::fs::create_dir_all(dir)?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE_NAME)
        .build(dir)
        .map_err(io::Error::other)
}

/// Initialize tracing for the application.
///
/// With `log_dir` set, diagnostics are appended to `LOG_FILE_NAME` in that
/// directory instead of stderr, which keeps a raw-mode terminal clean during
/// interactive sessions. If that file cannot be opened nothing is installed
/// and the error is returned; diagnostics never fall back to stderr in that
/// case. The returned guard must live until exit so buffered lines are
/// flushed.
pub fn init_tracing(
    level: &str,
    format: LogFormat,
    log_dir: Option<&Path>,
) -> io::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = log_dir.map(open_log_appender).transpose()?;
    let to_file = file_appender.is_some();

    let (writer, guard) = match file_appender {
        Some(appender) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(false).with_writer(writer))
                .init();
        }
        LogFormat::Pretty | LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(!to_file)
                        .with_writer(writer),
                )
                .init();
        }
    }

    Ok(guard)
}
