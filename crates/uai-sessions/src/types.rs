use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a single message within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

/// One turn in a session, ordered by append time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A durable record of one exchange with one provider.
///
/// Field names match the on-disk JSON layout (`projectPath`, `startTime`,
/// `endTime`). `end_time` is absent while the session is still open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub tool: String,
    pub project_path: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Session {
    pub fn new(id: String, tool: &str, project_path: &str) -> Self {
        Self {
            id,
            tool: tool.to_string(),
            project_path: project_path.to_string(),
            start_time: Utc::now(),
            end_time: None,
            messages: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Last path component of the project path, for compact listings.
    pub fn project_name(&self) -> &str {
        std::path::Path::new(&self.project_path)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.project_path)
    }
}

/// Summary figures derived from a session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub message_count: usize,
    pub duration: String,
}

impl SessionStats {
    /// Result reported for sessions that cannot be found.
    pub fn zero() -> Self {
        Self {
            message_count: 0,
            duration: "0m0s".to_string(),
        }
    }
}
