//! # uai-capture
//!
//! Runs an interactive AI tool in the user's terminal and records the
//! conversation into an open session.
//!
//! - [`launch`] starts the child on a pseudo-terminal, or on pipes when none
//!   is available
//! - [`Transcript`] decides which keystrokes form a submitted message
//! - [`drive`] pumps output and keystrokes until the child exits or the user
//!   presses Ctrl+C, then records the raw transcript

mod child;
mod driver;
mod error;
mod pipe;
mod pty;
mod terminal;
mod transcript;

pub use child::{
    launch, ChildExit, InteractiveChild, LaunchSpec, Launched, OUTPUT_CHANNEL_CAPACITY,
};
pub use driver::{drive, run_interactive, CaptureOutcome, CaptureReport};
pub use error::{CaptureError, Result};
pub use terminal::{spawn_key_reader, terminal_size, RawModeGuard};
pub use transcript::{
    CaptureState, EchoMode, KeyAction, Transcript, Utf8Accumulator, PROMPT_MARKER,
    SESSION_LOG_HEADER,
};
