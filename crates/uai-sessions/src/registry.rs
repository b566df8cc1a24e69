use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::{Result, SessionError};
use crate::stats::session_stats;
use crate::store::SessionStore;
use crate::types::{Message, Role, Session, SessionStats};

/// In-memory authority for open sessions.
///
/// Every mutation goes through the registry and is written through to the
/// store before the call returns, so the registry is the single writer for
/// each open session file. The table is guarded by a mutex; each method is
/// one critical section.
pub struct SessionRegistry {
    store: SessionStore,
    open: Mutex<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new(store: SessionStore) -> Self {
        Self {
            store,
            open: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.open.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create a session on disk and keep it open in memory.
    pub fn open(&self, tool: &str, project_path: &str) -> Result<String> {
        let session = self.store.create(tool, project_path)?;
        let id = session.id.clone();
        self.table().insert(id.clone(), session);
        debug!(id = %id, tool, "Opened session");
        Ok(id)
    }

    /// Append a message to an open session and persist the full record.
    ///
    /// Fails with [`SessionError::NotFound`] when the id is not open in this
    /// registry, even if a file with that id exists on disk. If the write
    /// fails the message is still kept in memory and will be written with the
    /// next mutation.
    pub fn append(&self, id: &str, role: Role, content: impl Into<String>) -> Result<()> {
        let mut table = self.table();
        let session = table
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        session.messages.push(Message::new(role, content));
        self.store.save(session)
    }

    /// Set the end time, persist, and release the session.
    ///
    /// Unknown or already-closed ids are a no-op. If the write fails the
    /// session stays open with its end time set, so a later `close` retries
    /// with the same end time.
    pub fn close(&self, id: &str) -> Result<()> {
        let mut table = self.table();
        let Some(session) = table.get_mut(id) else {
            return Ok(());
        };

        if session.end_time.is_none() {
            session.end_time = Some(Utc::now());
        }
        debug!(id, messages = session.messages.len(), "Closing session");
        self.store.save(session)?;
        table.remove(id);
        Ok(())
    }

    /// Message count and elapsed time, read from the persisted record.
    ///
    /// Never fails: unknown or unreadable sessions report [`SessionStats::zero`].
    pub fn stats(&self, id: &str) -> SessionStats {
        match self.store.read(id) {
            Ok(session) => session_stats(&session, Utc::now()),
            Err(SessionError::NotFound(_)) => SessionStats::zero(),
            Err(e) => {
                warn!(id, error = %e, "Failed to read session for stats");
                SessionStats::zero()
            }
        }
    }

    pub fn is_open(&self, id: &str) -> bool {
        self.table().contains_key(id)
    }

    pub fn open_ids(&self) -> Vec<String> {
        self.table().keys().cloned().collect()
    }
}
