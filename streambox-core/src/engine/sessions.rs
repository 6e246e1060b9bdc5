//! Viewer sessions per content hash.

use std::collections::HashMap;

use chrono::Utc;

use super::{SessionId, ViewerSession};
use crate::content::InfoHash;

/// Outcome of ending a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Session was active; `remaining` viewers are left on the content
    Removed { remaining: usize },
    /// Unknown session or hash; nothing changed
    NotFound,
}

#[derive(Default)]
pub(crate) struct SessionTracker {
    by_content: HashMap<InfoHash, HashMap<SessionId, ViewerSession>>,
}

impl SessionTracker {
    pub fn start(&mut self, info_hash: InfoHash) -> SessionId {
        let id = SessionId::generate();
        self.by_content.entry(info_hash).or_default().insert(
            id.clone(),
            ViewerSession {
                id: id.clone(),
                info_hash,
                started_at: Utc::now(),
            },
        );
        id
    }

    /// Removes one session. Unknown ids and hashes are a no-op.
    pub fn end(&mut self, info_hash: &InfoHash, session_id: &SessionId) -> SessionEnd {
        let Some(sessions) = self.by_content.get_mut(info_hash) else {
            return SessionEnd::NotFound;
        };
        if sessions.remove(session_id).is_none() {
            return SessionEnd::NotFound;
        }

        let remaining = sessions.len();
        if remaining == 0 {
            self.by_content.remove(info_hash);
        }
        SessionEnd::Removed { remaining }
    }

    pub fn count(&self, info_hash: &InfoHash) -> usize {
        self.by_content.get(info_hash).map_or(0, HashMap::len)
    }

    /// Drops every session on one content hash, returning how many there were.
    pub fn remove_all(&mut self, info_hash: &InfoHash) -> usize {
        self.by_content.remove(info_hash).map_or(0, |sessions| sessions.len())
    }

    pub fn total(&self) -> usize {
        self.by_content.values().map(HashMap::len).sum()
    }

    pub fn clear(&mut self) {
        self.by_content.clear();
    }
}
