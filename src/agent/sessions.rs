//! Process-lifetime store of conversation sessions

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;

use super::conversation::ConversationSession;
use super::types::{ConversationHistory, SessionId};

/// Shared handle to one session. The mutex serializes requests that target
/// the same session id.
pub type SessionHandle = Arc<Mutex<ConversationSession>>;

/// Keyed collection of sessions, created on demand.
///
/// Nothing is persisted; a store lives as long as the process that owns it.
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    max_history: usize,
}

impl SessionStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_history,
        }
    }

    /// Return the session for `session_id`, creating it if needed.
    ///
    /// `system_prompt` only applies when a new session is created. An empty
    /// id counts as absent and gets a fresh one.
    pub fn get_or_create(&self, session_id: Option<&str>, system_prompt: Option<&str>) -> SessionHandle {
        let session_id = session_id.filter(|id| !id.is_empty());
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());

        if let Some(id) = session_id {
            if let Some(existing) = sessions.get(id) {
                return existing.clone();
            }
        }

        let id = session_id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let session = Arc::new(Mutex::new(ConversationSession::new(
            id.clone(),
            system_prompt,
            self.max_history,
        )));
        sessions.insert(id.clone(), session.clone());
        tracing::info!(session_id = %id, "Created session");
        session
    }

    pub fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(session_id)
            .cloned()
    }

    /// Remove a session. Returns whether it existed.
    pub fn delete(&self, session_id: &str) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id)
            .is_some();
        if removed {
            tracing::info!(session_id, "Deleted session");
        }
        removed
    }

    pub fn list_ids(&self) -> Vec<SessionId> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Snapshot of a session's history, waiting for any in-flight request on it
    pub async fn history(&self, session_id: &str) -> Option<ConversationHistory> {
        let handle = self.get(session_id)?;
        let session = handle.lock().await;
        Some(session.snapshot())
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
