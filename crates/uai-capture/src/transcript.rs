//! Heuristic detection of submitted user input inside a raw terminal stream.
//!
//! The child's output is scanned line by line for an input prompt marker.
//! Once a marker has been seen, the next Enter with a non-empty input buffer
//! is recorded as a user message. This is a best-effort heuristic, not a
//! terminal emulator: cursor movement, redraws and escape sequences are not
//! interpreted.

/// Character that marks an input prompt line
pub const PROMPT_MARKER: char = '>';

/// First line of the system message holding the raw transcript
pub const SESSION_LOG_HEADER: &str = "=== Full session log ===";

const CTRL_C: u8 = 0x03;
const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;
const ERASE_ECHO: &[u8] = b"\x08 \x08";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    AwaitingPromptMarker,
    UserInputBuffering,
}

/// Who echoes keystrokes back to the user's terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoMode {
    /// The pseudo-terminal echoes on its own
    Terminal,
    /// Plain pipes: the capture echoes printable keys and erases on backspace
    Local,
}

/// Result of feeding one keystroke chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// Ctrl+C: stop the child, record nothing
    Interrupt,
    /// Forward the chunk to the child
    Forward {
        /// Bytes to write to the user's terminal
        echo: Option<Vec<u8>>,
        /// A completed user message
        submitted: Option<String>,
    },
}

/// Decodes a byte stream that may split multibyte characters across chunks.
#[derive(Debug, Default)]
pub struct Utf8Accumulator {
    pending: Vec<u8>,
}

impl Utf8Accumulator {
    /// Decode as much as possible, holding back an incomplete trailing sequence.
    /// Invalid bytes become U+FFFD.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush whatever is still held back.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

fn is_prompt_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with(PROMPT_MARKER) || trimmed.ends_with(PROMPT_MARKER)
}

/// Capture state for one interactive child
#[derive(Debug)]
pub struct Transcript {
    state: CaptureState,
    echo: EchoMode,
    decoder: Utf8Accumulator,
    line: String,
    input: String,
    raw: String,
}

impl Transcript {
    pub fn new(echo: EchoMode) -> Self {
        Self {
            state: CaptureState::AwaitingPromptMarker,
            echo,
            decoder: Utf8Accumulator::default(),
            line: String::new(),
            input: String::new(),
            raw: String::new(),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Keystrokes typed since the last Enter
    pub fn pending_input(&self) -> &str {
        &self.input
    }

    /// Feed a chunk of child output.
    pub fn on_output(&mut self, bytes: &[u8]) {
        let text = self.decoder.push(bytes);
        if text.is_empty() {
            return;
        }
        self.raw.push_str(&text);
        self.line.push_str(&text);

        if let Some(idx) = self.line.rfind('\n') {
            let tail = self.line.split_off(idx + 1);
            if self.line.split('\n').any(is_prompt_line) {
                self.state = CaptureState::UserInputBuffering;
            }
            self.line = tail;
        }

        // Pipes rarely terminate the prompt line before waiting for input
        if self.echo == EchoMode::Local && text.trim_end().ends_with(PROMPT_MARKER) {
            self.state = CaptureState::UserInputBuffering;
        }
    }

    /// Feed one keystroke chunk (a single read from the user's terminal).
    pub fn on_key(&mut self, chunk: &[u8]) -> KeyAction {
        if chunk == [CTRL_C] {
            return KeyAction::Interrupt;
        }

        let mut echo = None;
        let mut submitted = None;

        match chunk {
            b"\r" | b"\n" => {
                let text = self.input.trim();
                if !text.is_empty() && self.state == CaptureState::UserInputBuffering {
                    submitted = Some(text.to_string());
                    self.state = CaptureState::AwaitingPromptMarker;
                }
                self.input.clear();
            }
            [BACKSPACE | DELETE, ..] => {
                self.input.pop();
                if self.echo == EchoMode::Local {
                    echo = Some(ERASE_ECHO.to_vec());
                }
            }
            [first, ..] if *first >= 32 => {
                self.input.push_str(&String::from_utf8_lossy(chunk));
                if self.echo == EchoMode::Local {
                    echo = Some(chunk.to_vec());
                }
            }
            _ => {}
        }

        KeyAction::Forward { echo, submitted }
    }

    /// Content of the system message recorded when the child exits
    pub fn into_session_log(mut self) -> String {
        let rest = self.decoder.finish();
        self.raw.push_str(&rest);
        format!("{}\n{}", SESSION_LOG_HEADER, self.raw)
    }
}
