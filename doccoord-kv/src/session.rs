//! C6 — Session & Presence Registry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use crate::ids::{DocumentId, SessionId};
use crate::model::SessionRecord;

pub const DEFAULT_STALE_THRESHOLD: Duration = Duration::from_secs(120);

#[derive(Default)]
pub struct SessionRegistry {
    by_document: Mutex<HashMap<DocumentId, Vec<SessionRecord>>>,
}

/// Touch targets, mirroring spec §4.6's three independent timestamps.
#[derive(Clone, Copy, Default)]
pub struct Touch {
    pub heartbeat: bool,
    pub action: bool,
    pub save: bool,
}

impl Touch {
    pub fn heartbeat() -> Self {
        Touch { heartbeat: true, ..Default::default() }
    }

    pub fn action() -> Self {
        // Every accepted operation refreshes both action and heartbeat
        // (spec §4.6: "lastHeartbeat (updated by... every accepted operation)").
        Touch { heartbeat: true, action: true, ..Default::default() }
    }

    pub fn save() -> Self {
        Touch { save: true, ..Default::default() }
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry { by_document: Mutex::new(HashMap::new()) }
    }

    /// Returns `true` if this was the first session for `document` (so the
    /// caller can mark it in the active-document set).
    pub fn add_session(&self, document: DocumentId, session_id: SessionId, user_name: String) -> bool {
        let mut guard = self.by_document.lock().unwrap_or_else(|p| p.into_inner());
        let sessions = guard.entry(document).or_default();
        let was_empty = sessions.is_empty();
        sessions.push(SessionRecord::new(session_id, user_name));
        was_empty
    }

    /// Returns `true` if this was the last session for `document` (so the
    /// caller can remove it from the active-document set).
    pub fn remove_session(&self, document: DocumentId, session_id: SessionId) -> bool {
        let mut guard = self.by_document.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(sessions) = guard.get_mut(&document) {
            sessions.retain(|s| s.session_id != session_id);
            let now_empty = sessions.is_empty();
            if now_empty {
                guard.remove(&document);
            }
            return now_empty;
        }
        false
    }

    pub fn touch(&self, document: DocumentId, user_name: &str, touch: Touch) {
        let mut guard = self.by_document.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(sessions) = guard.get_mut(&document) {
            let now = SystemTime::now();
            for session in sessions.iter_mut().filter(|s| s.user_name == user_name) {
                if touch.heartbeat {
                    session.last_heartbeat = now;
                }
                if touch.action {
                    session.last_action = now;
                }
                if touch.save {
                    session.last_save = Some(now);
                }
            }
        }
    }

    pub fn list_sessions(&self, document: DocumentId) -> Vec<SessionRecord> {
        let guard = self.by_document.lock().unwrap_or_else(|p| p.into_inner());
        guard.get(&document).cloned().unwrap_or_default()
    }

    pub fn list_user_names(&self, document: DocumentId) -> Vec<String> {
        self.list_sessions(document).into_iter().map(|s| s.user_name).collect()
    }

    pub fn is_empty(&self, document: DocumentId) -> bool {
        let guard = self.by_document.lock().unwrap_or_else(|p| p.into_inner());
        guard.get(&document).map(|s| s.is_empty()).unwrap_or(true)
    }

    /// C8 step 1: remove every stale session across every tracked document,
    /// returning `(document, session_id)` pairs so the caller can publish
    /// `userLeft` for each.
    pub fn reap_stale(&self, threshold: Duration) -> Vec<(DocumentId, SessionId)> {
        let mut guard = self.by_document.lock().unwrap_or_else(|p| p.into_inner());
        let mut reaped = Vec::new();
        guard.retain(|document, sessions| {
            let (stale, fresh): (Vec<_>, Vec<_>) =
                sessions.drain(..).partition(|s| s.is_stale(threshold));
            for s in &stale {
                reaped.push((*document, s.session_id));
            }
            *sessions = fresh;
            !sessions.is_empty()
        });
        reaped
    }

    pub fn active_documents(&self) -> Vec<DocumentId> {
        let guard = self.by_document.lock().unwrap_or_else(|p| p.into_inner());
        guard.keys().copied().collect()
    }
}
