use std::io::{self, IsTerminal, Read};
use std::thread;

use crossterm::terminal;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{CaptureError, Result};

const DEFAULT_SIZE: (u16, u16) = (80, 24);

/// Keeps the user's terminal in raw mode until dropped.
pub struct RawModeGuard {
    enabled: bool,
}

impl RawModeGuard {
    /// Enable raw mode when stdin is a terminal; otherwise a no-op guard.
    pub fn enable() -> Result<Self> {
        if !io::stdin().is_terminal() {
            return Ok(Self { enabled: false });
        }
        terminal::enable_raw_mode().map_err(CaptureError::Terminal)?;
        debug!("Raw mode enabled");
        Ok(Self { enabled: true })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.enabled {
            if let Err(e) = terminal::disable_raw_mode() {
                warn!(error = %e, "Failed to restore terminal mode");
            }
        }
    }
}

/// Current terminal size as (cols, rows), 80x24 when unknown.
pub fn terminal_size() -> (u16, u16) {
    match terminal::size() {
        Ok((cols, rows)) if cols > 0 && rows > 0 => (cols, rows),
        _ => DEFAULT_SIZE,
    }
}

/// Stream raw reads from stdin. Each read is one keystroke chunk.
///
/// The reader thread stays blocked on stdin after the receiver is dropped
/// and exits on the next read.
pub fn spawn_key_reader() -> Result<mpsc::UnboundedReceiver<Vec<u8>>> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::Builder::new()
        .name("uai-stdin".to_string())
        .spawn(move || {
            let mut stdin = io::stdin();
            let mut buf = [0u8; 1024];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
        })?;
    Ok(rx)
}
