use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Result, SessionError};
use crate::types::Session;

/// Environment variable that overrides the default sessions directory.
pub const SESSION_DIR_ENV: &str = "UAI_SESSION_DIR";

const SESSION_EXT: &str = "json";

/// Provides access to session files on disk.
///
/// One pretty-printed JSON file per session, named `<id>.json`. Every write
/// replaces the whole record.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions_dir: PathBuf,
}

impl SessionStore {
    /// Create a store on `$UAI_SESSION_DIR`, falling back to `~/.ai-sessions`.
    pub fn new() -> Result<Self> {
        if let Some(dir) = std::env::var_os(SESSION_DIR_ENV) {
            return Ok(Self::with_dir(PathBuf::from(dir)));
        }
        let home = dirs::home_dir().ok_or(SessionError::NoHomeDir)?;
        Ok(Self::with_dir(home.join(".ai-sessions")))
    }

    /// Create a store with a custom directory (useful for testing).
    pub fn with_dir(sessions_dir: PathBuf) -> Self {
        Self { sessions_dir }
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    /// Ids name a single file inside the sessions directory.
    fn session_path(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.starts_with('.') || id.contains(['/', '\\', '\0']) {
            return Err(SessionError::InvalidId(id.to_string()));
        }
        Ok(self.sessions_dir.join(format!("{}.{}", id, SESSION_EXT)))
    }

    /// Create and persist a fresh session with a random v4 identifier.
    pub fn create(&self, tool: &str, project_path: &str) -> Result<Session> {
        let session = Session::new(Uuid::new_v4().to_string(), tool, project_path);
        self.save(&session)?;
        debug!(id = %session.id, tool, "Created session");
        Ok(session)
    }

    /// Serialize the full record, replacing any previous file content.
    pub fn save(&self, session: &Session) -> Result<()> {
        let path = self.session_path(&session.id)?;
        fs::create_dir_all(&self.sessions_dir).map_err(|source| SessionError::Persistence {
            path: self.sessions_dir.clone(),
            source,
        })?;

        let json = serde_json::to_string_pretty(session).map_err(|source| SessionError::Corrupt {
            path: path.clone(),
            source,
        })?;

        fs::write(&path, json).map_err(|source| SessionError::Persistence { path, source })
    }

    /// Load a persisted session regardless of whether it is still open.
    pub fn read(&self, id: &str) -> Result<Session> {
        let path = self.session_path(id)?;
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionError::NotFound(id.to_string()));
            }
            Err(source) => return Err(SessionError::Persistence { path, source }),
        };

        serde_json::from_str(&data).map_err(|source| SessionError::Corrupt { path, source })
    }

    /// List every readable session, newest first. Unreadable files are skipped.
    pub fn list(&self) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();

        for path in self.session_files()? {
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.read(id) {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable session file");
                }
            }
        }

        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(sessions)
    }

    /// Remove every persisted session file. Returns the number removed.
    ///
    /// Open sessions held by a registry are untouched and will write their
    /// file again on their next mutation.
    pub fn delete_all(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.session_files()? {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(SessionError::Persistence { path, source }),
            }
        }
        debug!(removed, "Deleted session files");
        Ok(removed)
    }

    fn session_files(&self) -> Result<Vec<PathBuf>> {
        if !self.sessions_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.sessions_dir).map_err(|source| SessionError::Persistence {
            path: self.sessions_dir.clone(),
            source,
        })?;

        Ok(entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some(SESSION_EXT))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_writes_file_named_by_id() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::with_dir(dir.path().to_path_buf());

        let session = store.create("demo", "/tmp/p").unwrap();

        let path = dir.path().join(format!("{}.json", session.id));
        assert!(path.exists());
        let raw = fs::read_to_string(path).unwrap();
        assert!(raw.contains("\"projectPath\": \"/tmp/p\""));
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::with_dir(dir.path().to_path_buf());

        let err = store.read("nope").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_read_corrupt_is_not_not_found() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
        let store = SessionStore::with_dir(dir.path().to_path_buf());

        let err = store.read("bad").unwrap_err();
        assert!(matches!(err, SessionError::Corrupt { .. }));
    }

    #[test]
    fn test_list_on_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::with_dir(dir.path().join("does-not-exist"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_create_ids_are_unique() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::with_dir(dir.path().to_path_buf());

        let a = store.create("demo", "/tmp").unwrap();
        let b = store.create("demo", "/tmp").unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn test_ids_cannot_leave_sessions_dir() {
        let dir = TempDir::new().unwrap();
        let sessions_dir = dir.path().join("sessions");
        fs::create_dir_all(&sessions_dir).unwrap();
        fs::write(dir.path().join("outside.json"), "{}").unwrap();
        let store = SessionStore::with_dir(sessions_dir);

        for id in ["../outside", "a/b", "..", "", "a\\b"] {
            assert!(
                matches!(store.read(id), Err(SessionError::InvalidId(_))),
                "id {id:?} was accepted"
            );
        }

        let mut session = Session::new("../escape".to_string(), "demo", "/tmp/p");
        assert!(matches!(store.save(&session), Err(SessionError::InvalidId(_))));
        session.id = "fine".to_string();
        store.save(&session).unwrap();
        assert_eq!(store.read("fine").unwrap().id, "fine");
    }
}
