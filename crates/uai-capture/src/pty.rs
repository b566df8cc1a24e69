use std::io::{self, Read, Write};
use std::thread;

use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::child::{ChildExit, InteractiveChild, LaunchSpec, Launched, OUTPUT_CHANNEL_CAPACITY};
use crate::error::{CaptureError, Result};
use crate::transcript::EchoMode;

const TERM: &str = "xterm-color";
const READ_CHUNK: usize = 4096;

struct PtyChild {
    // Dropping the master hangs up the child's terminal
    _master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
}

impl InteractiveChild for PtyChild {
    fn write_input(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)?;
        self.writer.flush()
    }

    fn kill(&mut self) -> io::Result<()> {
        self.child.kill()
    }

    fn try_wait(&mut self) -> io::Result<Option<ChildExit>> {
        Ok(self.child.try_wait()?.map(|status| ChildExit {
            code: Some(status.exit_code() as i32),
        }))
    }

    fn echo_mode(&self) -> EchoMode {
        EchoMode::Terminal
    }
}

pub(crate) fn launch(spec: &LaunchSpec) -> Result<Launched> {
    let (cols, rows) = spec.size;
    info!(
        program = %spec.program.display(),
        cwd = %spec.cwd.display(),
        cols,
        rows,
        "Spawning child on pseudo-terminal"
    );

    let pair = native_pty_system()
        .openpty(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| CaptureError::PtyUnavailable(e.to_string()))?;

    let mut cmd = CommandBuilder::new(&spec.program);
    cmd.args(&spec.args);
    cmd.cwd(&spec.cwd);
    cmd.env("TERM", TERM);
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }

    let child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| CaptureError::LaunchFailure {
            program: spec.program_name(),
            reason: e.to_string(),
        })?;
    // The reader only sees EOF once no slave handle is left open here
    drop(pair.slave);

    let reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| CaptureError::Io(io::Error::other(e)))?;
    let writer = pair
        .master
        .take_writer()
        .map_err(|e| CaptureError::Io(io::Error::other(e)))?;

    let (tx, rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
    thread::Builder::new()
        .name("uai-pty-reader".to_string())
        .spawn(move || pump(reader, tx))?;

    Ok(Launched {
        child: Box::new(PtyChild {
            _master: pair.master,
            writer,
            child,
        }),
        output: rx,
    })
}

/// Forward reads into the channel until EOF or until the receiver is gone.
/// Linux reports a hung-up terminal as EIO, which also ends the stream.
/// Must run on a plain thread: sends block while the channel is full.
pub(crate) fn pump(mut reader: impl Read, tx: mpsc::Sender<Vec<u8>>) {
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                trace!(bytes = n, "Child output");
                if tx.blocking_send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(error = %e, "Child output stream closed");
                break;
            }
        }
    }
}
