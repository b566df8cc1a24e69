use std::io;
use std::path::PathBuf;

use tokio::sync::mpsc::Receiver;
use tracing::warn;

use crate::error::{CaptureError, Result};
use crate::transcript::EchoMode;
use crate::{pipe, pty};

/// Exit information for a finished child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExit {
    /// Exit code, when the platform reports one
    pub code: Option<i32>,
}

/// A running interactive child process.
pub trait InteractiveChild: Send {
    /// Forward raw keystrokes to the child.
    fn write_input(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn kill(&mut self) -> io::Result<()>;

    /// Non-blocking exit check.
    fn try_wait(&mut self) -> io::Result<Option<ChildExit>>;

    fn echo_mode(&self) -> EchoMode;
}

/// What to run and where
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
    /// Terminal size as (cols, rows)
    pub size: (u16, u16),
}

impl LaunchSpec {
    pub fn new(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: Vec::new(),
            size: (80, 24),
        }
    }

    pub fn with_size(mut self, cols: u16, rows: u16) -> Self {
        self.size = (cols, rows);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub(crate) fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

/// Chunks buffered between a reader thread and the capture loop. A full
/// buffer blocks the reader, which in turn stalls the child.
pub const OUTPUT_CHANNEL_CAPACITY: usize = 64;

/// A started child plus the stream of everything it prints
pub struct Launched {
    pub child: Box<dyn InteractiveChild>,
    pub output: Receiver<Vec<u8>>,
}

/// Start the child on a pseudo-terminal, or on plain pipes when no
/// pseudo-terminal can be opened.
///
/// A child that cannot be started at all is [`CaptureError::LaunchFailure`].
pub fn launch(spec: &LaunchSpec) -> Result<Launched> {
    match pty::launch(spec) {
        Err(CaptureError::PtyUnavailable(reason)) => {
            warn!(reason = %reason, "Pseudo-terminal unavailable, falling back to pipes");
            pipe::launch(spec)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_launch_failure() {
        let spec = LaunchSpec::new("/nonexistent/uai-test-tool", std::env::temp_dir());
        match launch(&spec) {
            Err(CaptureError::LaunchFailure { program, .. }) => {
                assert_eq!(program, "/nonexistent/uai-test-tool");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("launch should fail"),
        }
    }
}
