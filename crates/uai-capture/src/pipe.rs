use std::io::{self, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread;

use tokio::sync::mpsc;
use tracing::info;

use crate::child::{ChildExit, InteractiveChild, LaunchSpec, Launched, OUTPUT_CHANNEL_CAPACITY};
use crate::error::{CaptureError, Result};
use crate::pty::pump;
use crate::transcript::EchoMode;

struct PipeChild {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl InteractiveChild for PipeChild {
    fn write_input(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self.stdin.as_mut() {
            Some(stdin) => {
                stdin.write_all(bytes)?;
                stdin.flush()
            }
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "child stdin closed")),
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        self.stdin.take();
        match self.child.kill() {
            // Already exited
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            other => other,
        }
    }

    fn try_wait(&mut self) -> io::Result<Option<ChildExit>> {
        Ok(self
            .child
            .try_wait()?
            .map(|status| ChildExit { code: status.code() }))
    }

    fn echo_mode(&self) -> EchoMode {
        EchoMode::Local
    }
}

/// Run the child on plain pipes. Stdout and stderr share one output stream.
pub(crate) fn launch(spec: &LaunchSpec) -> Result<Launched> {
    info!(program = %spec.program.display(), cwd = %spec.cwd.display(), "Spawning child on pipes");

    let mut child = Command::new(&spec.program)
        .args(&spec.args)
        .current_dir(&spec.cwd)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| CaptureError::LaunchFailure {
            program: spec.program_name(),
            reason: e.to_string(),
        })?;

    let (tx, rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
    if let Some(stdout) = child.stdout.take() {
        let tx = tx.clone();
        thread::Builder::new()
            .name("uai-pipe-stdout".to_string())
            .spawn(move || pump(stdout, tx))?;
    }
    if let Some(stderr) = child.stderr.take() {
        thread::Builder::new()
            .name("uai-pipe-stderr".to_string())
            .spawn(move || pump(stderr, tx))?;
    }

    let stdin = child.stdin.take();
    Ok(Launched {
        child: Box::new(PipeChild { child, stdin }),
        output: rx,
    })
}
