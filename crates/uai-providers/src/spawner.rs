use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, trace};

use crate::{ProcessOutput, ProviderConfig, ProviderError};

/// Utility for spawning non-interactive tool processes
pub struct ProcessSpawner;

impl ProcessSpawner {
    /// Spawn a process, optionally feed it `stdin_input`, and capture its output.
    ///
    /// When `config.timeout` elapses the child is killed and
    /// [`ProviderError::Timeout`] is returned; no partial output is kept.
    pub async fn spawn(
        binary: &Path,
        args: &[&str],
        config: &ProviderConfig,
        stdin_input: Option<&str>,
    ) -> Result<ProcessOutput, ProviderError> {
        let start = Instant::now();

        debug!(
            binary = %binary.display(),
            args = ?args,
            working_dir = %config.working_dir.display(),
            "Spawning tool process"
        );

        let mut cmd = Command::new(binary);
        cmd.args(args)
            .current_dir(&config.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin_input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        for (key, value) in &config.env_vars {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|source| ProviderError::LaunchFailed {
            binary: binary.display().to_string(),
            source,
        })?;

        if let (Some(input), Some(mut stdin)) = (stdin_input, child.stdin.take()) {
            stdin.write_all(input.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            // Dropping stdin closes the pipe so the tool sees EOF
        }

        let stdout_handle = child
            .stdout
            .take()
            .ok_or_else(|| ProviderError::ExecutionFailed("stdout not captured".to_string()))?;
        let stderr_handle = child
            .stderr
            .take()
            .ok_or_else(|| ProviderError::ExecutionFailed("stderr not captured".to_string()))?;

        let run = async {
            let (stdout, stderr) = tokio::join!(
                collect_lines(stdout_handle, "stdout"),
                collect_lines(stderr_handle, "stderr")
            );
            let status = child.wait().await?;
            Ok::<_, ProviderError>((stdout?, stderr?, status))
        };

        let (stdout, stderr, status) = match config.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result?,
                Err(_) => {
                    let _ = child.start_kill();
                    debug!(timeout_secs = limit.as_secs(), "Tool process timed out");
                    return Err(ProviderError::Timeout(limit));
                }
            },
            None => run.await?,
        };

        let duration = start.elapsed();
        debug!(
            exit_code = status.code().unwrap_or(-1),
            duration_ms = duration.as_millis(),
            "Tool process completed"
        );

        Ok(ProcessOutput::new(
            stdout,
            stderr,
            status.code().unwrap_or(-1),
            duration,
        ))
    }
}

async fn collect_lines<R>(stream: R, label: &'static str) -> Result<String, ProviderError>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream).lines();
    let mut collected = String::new();

    while let Some(line) = reader.next_line().await.map_err(|e| {
        ProviderError::ExecutionFailed(format!("Failed to read {}: {}", label, e))
    })? {
        trace!(stream = label, line = %line);
        if !collected.is_empty() {
            collected.push('\n');
        }
        collected.push_str(&line);
    }

    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config() -> ProviderConfig {
        ProviderConfig::new(std::env::temp_dir())
    }

    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let out = ProcessSpawner::spawn(&PathBuf::from("sh"), &["-c", "echo hi; exit 3"], &config(), None)
            .await
            .unwrap();
        assert_eq!(out.stdout, "hi");
        assert_eq!(out.exit_code, 3);
    }

    #[tokio::test]
    async fn test_captures_stderr() {
        let out = ProcessSpawner::spawn(&PathBuf::from("sh"), &["-c", "echo oops >&2"], &config(), None)
            .await
            .unwrap();
        assert!(out.stdout.is_empty());
        assert_eq!(out.stderr, "oops");
        assert!(out.success());
    }

    #[tokio::test]
    async fn test_writes_stdin() {
        let out = ProcessSpawner::spawn(&PathBuf::from("cat"), &[], &config(), Some("from stdin"))
            .await
            .unwrap();
        assert_eq!(out.stdout, "from stdin");
    }

    #[tokio::test]
    async fn test_passes_env_vars() {
        let cfg = config().with_env("UAI_TEST_VALUE".to_string(), "42".to_string());
        let out = ProcessSpawner::spawn(&PathBuf::from("sh"), &["-c", "echo $UAI_TEST_VALUE"], &cfg, None)
            .await
            .unwrap();
        assert_eq!(out.stdout, "42");
    }

    #[tokio::test]
    async fn test_missing_binary_is_launch_failure() {
        let err = ProcessSpawner::spawn(&PathBuf::from("/nonexistent/binary"), &[], &config(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::LaunchFailed { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let cfg = config().with_timeout(Duration::from_millis(100));
        let started = Instant::now();
        let err = ProcessSpawner::spawn(&PathBuf::from("sleep"), &["5"], &cfg, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
