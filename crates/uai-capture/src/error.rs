use thiserror::Error;

/// Errors that can occur while starting or running an interactive capture
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The child could not be started; callers fall back to a
    /// non-interactive path.
    #[error("Failed to launch {program}: {reason}")]
    LaunchFailure { program: String, reason: String },

    #[error("Pseudo-terminal unavailable: {0}")]
    PtyUnavailable(String),

    #[error("Terminal error: {0}")]
    Terminal(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CaptureError>;
