use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Output captured from a spawned tool process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOutput {
    /// Combined stdout output
    pub stdout: String,
    /// Combined stderr output
    pub stderr: String,
    /// Exit code from the process (-1 when killed by a signal)
    pub exit_code: i32,
    /// Duration of execution
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

impl ProcessOutput {
    pub fn new(stdout: String, stderr: String, exit_code: i32, duration: Duration) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
            duration,
        }
    }

    /// Check if the process exited successfully
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Which integration path produced a provider result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPath {
    /// The provider's own command-line tool
    Cli,
    /// The provider's HTTP API
    Api,
}

/// Result of one provider invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderOutput {
    /// Text shown to the user
    pub content: String,
    /// Text recorded as the assistant turn, when it differs from `content`
    pub record: Option<String>,
    pub path: ExecutionPath,
    /// Why the preferred path was abandoned, if it was
    pub fallback_reason: Option<String>,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

impl ProviderOutput {
    pub fn new(content: String, path: ExecutionPath, duration: Duration) -> Self {
        Self {
            content,
            record: None,
            path,
            fallback_reason: None,
            duration,
        }
    }

    pub fn with_record(mut self, record: String) -> Self {
        self.record = Some(record);
        self
    }

    pub fn with_fallback_reason(mut self, reason: String) -> Self {
        self.fallback_reason = Some(reason);
        self
    }

    /// Text to store as the assistant message
    pub fn recorded_content(&self) -> &str {
        self.record.as_deref().unwrap_or(&self.content)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_content_prefers_record() {
        let out = ProviderOutput::new("pretty".to_string(), ExecutionPath::Api, Duration::ZERO)
            .with_record("{\"raw\":true}".to_string());
        assert_eq!(out.recorded_content(), "{\"raw\":true}");

        let plain = ProviderOutput::new("text".to_string(), ExecutionPath::Cli, Duration::ZERO);
        assert_eq!(plain.recorded_content(), "text");
    }

    #[test]
    fn test_success_is_exit_code_zero() {
        assert!(ProcessOutput::new("out".into(), String::new(), 0, Duration::ZERO).success());
        assert!(!ProcessOutput::new("out".into(), "err".into(), 1, Duration::ZERO).success());
    }
}
