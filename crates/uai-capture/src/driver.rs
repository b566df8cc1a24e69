use std::io::Write;
use std::time::Duration;

use tokio::sync::mpsc::{Receiver, UnboundedReceiver};
use tracing::{debug, info, warn};
use uai_sessions::{Role, SessionRegistry};

use crate::child::{InteractiveChild, LaunchSpec};
use crate::error::Result;
use crate::terminal::{spawn_key_reader, RawModeGuard};
use crate::transcript::{KeyAction, Transcript};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);
const REAP_TIMEOUT: Duration = Duration::from_secs(5);
const REAP_POLL: Duration = Duration::from_millis(50);

/// How the interactive child ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Exited { exit_code: Option<i32> },
    /// The user pressed Ctrl+C and the child was killed
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReport {
    pub outcome: CaptureOutcome,
    /// User messages detected and recorded
    pub user_messages: usize,
    /// Session writes that failed and were skipped
    pub persistence_errors: usize,
}

impl CaptureReport {
    pub fn interrupted(&self) -> bool {
        self.outcome == CaptureOutcome::Interrupted
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.outcome {
            CaptureOutcome::Exited { exit_code } => exit_code,
            CaptureOutcome::Interrupted => None,
        }
    }
}

/// Appends to the open session; failures are logged and counted, never raised.
struct SessionSink<'a> {
    registry: &'a SessionRegistry,
    session_id: &'a str,
    user_messages: usize,
    persistence_errors: usize,
}

impl SessionSink<'_> {
    fn record(&mut self, role: Role, content: String) {
        match self.registry.append(self.session_id, role, content) {
            Ok(()) => {
                if role == Role::User {
                    self.user_messages += 1;
                }
            }
            Err(e) => {
                self.persistence_errors += 1;
                warn!(session_id = self.session_id, error = %e, "Failed to record message");
            }
        }
    }
}

/// Launch `spec`, put the terminal in raw mode and capture the session
/// until the child exits or the user interrupts it.
pub async fn run_interactive(
    spec: &LaunchSpec,
    registry: &SessionRegistry,
    session_id: &str,
) -> Result<CaptureReport> {
    let launched = crate::child::launch(spec)?;
    let _raw = RawModeGuard::enable()?;
    let keys = spawn_key_reader()?;
    let mut stdout = std::io::stdout();

    Ok(drive(launched.child, launched.output, keys, &mut stdout, registry, session_id).await)
}

/// Pump child output to `terminal` and keystrokes to the child, recording
/// submitted input and, once the child is gone, the full transcript.
///
/// Keystrokes are polled before output so Ctrl+C is seen even while the
/// child prints without pause.
pub async fn drive<W: Write>(
    mut child: Box<dyn InteractiveChild>,
    mut output: Receiver<Vec<u8>>,
    mut keys: UnboundedReceiver<Vec<u8>>,
    terminal: &mut W,
    registry: &SessionRegistry,
    session_id: &str,
) -> CaptureReport {
    let mut transcript = Transcript::new(child.echo_mode());
    let mut sink = SessionSink {
        registry,
        session_id,
        user_messages: 0,
        persistence_errors: 0,
    };
    let mut keys_open = true;
    let mut interrupted = false;

    loop {
        tokio::select! {
            biased;

            key = keys.recv(), if keys_open => match key {
                Some(chunk) => match transcript.on_key(&chunk) {
                    KeyAction::Interrupt => {
                        info!(session_id, "Interrupted, stopping child");
                        if let Err(e) = child.kill() {
                            warn!(error = %e, "Failed to kill child");
                        }
                        interrupted = true;
                        break;
                    }
                    KeyAction::Forward { echo, submitted } => {
                        if let Err(e) = child.write_input(&chunk) {
                            debug!(error = %e, "Failed to forward input");
                        }
                        if let Some(echo) = echo {
                            show(terminal, &echo);
                        }
                        if let Some(message) = submitted {
                            debug!(session_id, len = message.len(), "User input submitted");
                            sink.record(Role::User, message);
                        }
                    }
                },
                None => keys_open = false,
            },

            chunk = output.recv() => match chunk {
                Some(bytes) => {
                    show(terminal, &bytes);
                    transcript.on_output(&bytes);
                }
                None => break,
            },
        }
    }

    if interrupted {
        let drain = async {
            while let Some(bytes) = output.recv().await {
                show(terminal, &bytes);
                transcript.on_output(&bytes);
            }
        };
        if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
            debug!("Child output still open after interrupt");
        }
    }

    let exit_code = reap(child.as_mut()).await;
    sink.record(Role::System, transcript.into_session_log());

    let outcome = if interrupted {
        CaptureOutcome::Interrupted
    } else {
        CaptureOutcome::Exited { exit_code }
    };
    info!(session_id, ?outcome, user_messages = sink.user_messages, "Capture finished");

    CaptureReport {
        outcome,
        user_messages: sink.user_messages,
        persistence_errors: sink.persistence_errors,
    }
}

fn show<W: Write>(terminal: &mut W, bytes: &[u8]) {
    if let Err(e) = terminal.write_all(bytes).and_then(|_| terminal.flush()) {
        debug!(error = %e, "Failed to write to terminal");
    }
}

async fn reap(child: &mut dyn InteractiveChild) -> Option<i32> {
    let deadline = tokio::time::Instant::now() + REAP_TIMEOUT;
    loop {
        match child.try_wait() {
            Ok(Some(exit)) => return exit.code,
            Ok(None) if tokio::time::Instant::now() < deadline => {
                tokio::time::sleep(REAP_POLL).await;
            }
            Ok(None) => {
                warn!("Child did not exit after its output closed, killing it");
                let _ = child.kill();
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to collect child exit status");
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::child::ChildExit;
    use crate::transcript::EchoMode;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use crate::child::OUTPUT_CHANNEL_CAPACITY;
    use tokio::sync::mpsc::{self, Sender};
    use uai_sessions::SessionStore;

    #[derive(Default)]
    struct FakeState {
        output: Option<Sender<Vec<u8>>>,
        input: Vec<u8>,
        exit: Option<ChildExit>,
        killed: bool,
    }

    /// Test side of the fake child
    #[derive(Clone)]
    struct FakeHandle(Arc<Mutex<FakeState>>);

    impl FakeHandle {
        fn emit(&self, bytes: &[u8]) {
            if let Some(tx) = &self.0.lock().unwrap().output {
                tx.try_send(bytes.to_vec()).unwrap();
            }
        }

        /// A sender for a writer thread that outlives the fake's own handle
        fn sender(&self) -> Sender<Vec<u8>> {
            self.0.lock().unwrap().output.clone().unwrap()
        }

        fn exit(&self, code: i32) {
            let mut state = self.0.lock().unwrap();
            state.output = None;
            state.exit = Some(ChildExit { code: Some(code) });
        }

        fn input(&self) -> Vec<u8> {
            self.0.lock().unwrap().input.clone()
        }

        fn killed(&self) -> bool {
            self.0.lock().unwrap().killed
        }
    }

    struct FakeChild {
        handle: FakeHandle,
        echo: EchoMode,
    }

    impl InteractiveChild for FakeChild {
        fn write_input(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.handle.0.lock().unwrap().input.extend_from_slice(bytes);
            Ok(())
        }

        fn kill(&mut self) -> io::Result<()> {
            let mut state = self.handle.0.lock().unwrap();
            state.killed = true;
            state.output = None;
            state.exit.get_or_insert(ChildExit { code: None });
            Ok(())
        }

        fn try_wait(&mut self) -> io::Result<Option<ChildExit>> {
            Ok(self.handle.0.lock().unwrap().exit)
        }

        fn echo_mode(&self) -> EchoMode {
            self.echo
        }
    }

    fn fake_child(echo: EchoMode) -> (Box<dyn InteractiveChild>, FakeHandle, Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        let handle = FakeHandle(Arc::new(Mutex::new(FakeState {
            output: Some(tx),
            ..Default::default()
        })));
        let child = FakeChild {
            handle: handle.clone(),
            echo,
        };
        (Box::new(child), handle, rx)
    }

    fn registry() -> (TempDir, SessionRegistry, String) {
        let dir = TempDir::new().unwrap();
        let registry = SessionRegistry::new(SessionStore::with_dir(dir.path().to_path_buf()));
        let id = registry.open("claude-code", "/tmp/p").unwrap();
        (dir, registry, id)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_marker_and_enter_records_user_message() {
        let (_dir, registry, id) = registry();
        let (child, handle, output) = fake_child(EchoMode::Terminal);
        let (key_tx, keys) = mpsc::unbounded_channel();
        let mut screen = Vec::new();

        let script = async {
            handle.emit(b"Welcome\n> \n");
            settle().await;
            key_tx.send(b"hello".to_vec()).unwrap();
            key_tx.send(b"\r".to_vec()).unwrap();
            settle().await;
            handle.emit(b"Hi there\n");
            handle.exit(0);
        };

        let (report, ()) = tokio::join!(
            drive(child, output, keys, &mut screen, &registry, &id),
            script
        );

        assert_eq!(report.outcome, CaptureOutcome::Exited { exit_code: Some(0) });
        assert_eq!(report.user_messages, 1);
        assert_eq!(handle.input(), b"hello\r".to_vec());
        assert_eq!(String::from_utf8(screen).unwrap(), "Welcome\n> \nHi there\n");

        registry.close(&id).unwrap();
        let session = registry.store().read(&id).unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].role, Role::User);
        assert_eq!(session.messages[0].content, "hello");
        assert_eq!(session.messages[1].role, Role::System);
        assert_eq!(
            session.messages[1].content,
            "=== Full session log ===\nWelcome\n> \nHi there\n"
        );
    }

    #[tokio::test]
    async fn test_without_marker_only_system_dump_is_recorded() {
        let (_dir, registry, id) = registry();
        let (child, handle, output) = fake_child(EchoMode::Terminal);
        let (key_tx, keys) = mpsc::unbounded_channel();
        let mut screen = Vec::new();

        let script = async {
            handle.emit(b"no prompt here\n");
            settle().await;
            key_tx.send(b"hello".to_vec()).unwrap();
            key_tx.send(b"\r".to_vec()).unwrap();
            settle().await;
            handle.exit(0);
        };

        let (report, ()) = tokio::join!(
            drive(child, output, keys, &mut screen, &registry, &id),
            script
        );

        assert_eq!(report.user_messages, 0);
        let session = registry.store().read(&id).unwrap();
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, Role::System);
    }

    #[tokio::test]
    async fn test_ctrl_c_kills_child_and_records_no_input() {
        let (_dir, registry, id) = registry();
        let (child, handle, output) = fake_child(EchoMode::Terminal);
        let (key_tx, keys) = mpsc::unbounded_channel();
        let mut screen = Vec::new();

        let script = async {
            handle.emit(b"> \n");
            settle().await;
            key_tx.send(b"unsent".to_vec()).unwrap();
            key_tx.send(vec![0x03]).unwrap();
            key_tx.send(b"\r".to_vec()).unwrap();
        };

        let (report, ()) = tokio::join!(
            drive(child, output, keys, &mut screen, &registry, &id),
            script
        );

        assert!(report.interrupted());
        assert_eq!(report.user_messages, 0);
        assert!(handle.killed());
        // Ctrl+C itself is never forwarded
        assert_eq!(handle.input(), b"unsent".to_vec());

        let session = registry.store().read(&id).unwrap();
        assert_eq!(session.messages.len(), 1);
        assert!(session.messages[0].content.starts_with("=== Full session log ==="));
    }

    #[tokio::test]
    async fn test_pipe_mode_echoes_keys_to_terminal() {
        let (_dir, registry, id) = registry();
        let (child, handle, output) = fake_child(EchoMode::Local);
        let (key_tx, keys) = mpsc::unbounded_channel();
        let mut screen = Vec::new();

        let script = async {
            handle.emit(b"ready> ");
            settle().await;
            let typed: [&[u8]; 5] = [b"a", b"b", b"c", &[0x7f], b"\r"];
            for key in typed {
                key_tx.send(key.to_vec()).unwrap();
            }
            settle().await;
            handle.exit(3);
        };

        let (report, ()) = tokio::join!(
            drive(child, output, keys, &mut screen, &registry, &id),
            script
        );

        assert_eq!(report.exit_code(), Some(3));
        assert_eq!(report.user_messages, 1);
        assert_eq!(screen, b"ready> abc\x08 \x08".to_vec());

        let session = registry.store().read(&id).unwrap();
        assert_eq!(session.messages[0].content, "ab");
    }

    #[tokio::test]
    async fn test_unknown_session_failures_are_swallowed() {
        let (_dir, registry, _id) = registry();
        let (child, handle, output) = fake_child(EchoMode::Terminal);
        let (_key_tx, keys) = mpsc::unbounded_channel::<Vec<u8>>();
        let mut screen = Vec::new();

        handle.emit(b"bye\n");
        handle.exit(0);
        let report = drive(child, output, keys, &mut screen, &registry, "missing-id").await;

        assert_eq!(report.persistence_errors, 1);
        assert_eq!(report.outcome, CaptureOutcome::Exited { exit_code: Some(0) });
    }

    #[tokio::test]
    async fn test_ctrl_c_is_seen_while_child_prints_continuously() {
        let (_dir, registry, id) = registry();
        let (child, handle, output) = fake_child(EchoMode::Terminal);
        let (key_tx, keys) = mpsc::unbounded_channel();
        let mut screen = Vec::new();

        let tx = handle.sender();
        let printer_handle = handle.clone();
        let printer = std::thread::spawn(move || {
            while !printer_handle.killed() {
                if tx.blocking_send(b"y\ny\ny\ny\n".to_vec()).is_err() {
                    break;
                }
            }
        });

        let script = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            key_tx.send(vec![0x03]).unwrap();
        };

        let capture = async {
            tokio::join!(
                drive(child, output, keys, &mut screen, &registry, &id),
                script
            )
        };
        let (report, ()) = tokio::time::timeout(Duration::from_secs(5), capture)
            .await
            .expect("capture ignored Ctrl+C");
        printer.join().unwrap();

        assert!(report.interrupted());
        assert!(handle.killed());
        assert_eq!(report.user_messages, 0);
    }

    #[tokio::test]
    async fn test_write_failures_mid_capture_are_counted_not_raised() {
        let dir = TempDir::new().unwrap();
        let sessions_dir = dir.path().join("sessions");
        let registry = SessionRegistry::new(SessionStore::with_dir(sessions_dir.clone()));
        let id = registry.open("claude-code", "/tmp/p").unwrap();

        let (child, handle, output) = fake_child(EchoMode::Terminal);
        let (key_tx, keys) = mpsc::unbounded_channel();
        let mut screen = Vec::new();

        let script = async {
            handle.emit(b"> \n");
            settle().await;
            // The sessions directory turns into a plain file mid-session
            std::fs::remove_dir_all(&sessions_dir).unwrap();
            std::fs::write(&sessions_dir, b"").unwrap();
            key_tx.send(b"hello".to_vec()).unwrap();
            key_tx.send(b"\r".to_vec()).unwrap();
            settle().await;
            handle.emit(b"done\n");
            handle.exit(0);
        };

        let (report, ()) = tokio::join!(
            drive(child, output, keys, &mut screen, &registry, &id),
            script
        );

        assert_eq!(report.outcome, CaptureOutcome::Exited { exit_code: Some(0) });
        assert_eq!(report.user_messages, 0);
        assert_eq!(report.persistence_errors, 2);
        assert_eq!(screen, b"> \ndone\n".to_vec());

        // Both messages survive in memory and land once the directory is back
        std::fs::remove_file(&sessions_dir).unwrap();
        registry.close(&id).unwrap();
        let session = registry.store().read(&id).unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].content, "hello");
        assert!(session.end_time.is_some());
    }
}
