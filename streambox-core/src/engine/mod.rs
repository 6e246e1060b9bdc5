//! Content engine: deduplicated acquisition, viewer sessions and eviction.
//!
//! The registry, session tracker and eviction scheduler are owned by a single
//! actor task. Every mutation is a command on its channel, so a session
//! ending and a new one starting for the same content are always applied in
//! arrival order. The actor never awaits swarm work itself: acquisitions,
//! eviction timers and destroy calls run in spawned tasks that report back
//! over an internal channel.

pub mod actor;
pub mod commands;
pub mod handle;

mod eviction;
mod registry;
mod sessions;
mod state;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use actor::spawn_content_engine;
pub use commands::ContentEngineCommand;
pub use handle::ContentEngineHandle;
pub use sessions::SessionEnd;

use crate::content::{ContentHandle, FileDescriptor, InfoHash};

/// Opaque viewer session identifier, `sess_` followed by 32 hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh, unique session id.
    pub fn generate() -> Self {
        Self(format!("sess_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A viewer's claim on one piece of content.
#[derive(Debug, Clone)]
pub struct ViewerSession {
    pub id: SessionId,
    pub info_hash: InfoHash,
    pub started_at: DateTime<Utc>,
}

/// Result of an acquisition request.
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub content: Arc<ContentHandle>,
    /// Set when the request asked for a session to be opened atomically
    pub session_id: Option<SessionId>,
}

/// Snapshot of one piece of content for monitoring and status endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSummary {
    pub info_hash: InfoHash,
    pub name: String,
    pub files: Vec<FileDescriptor>,
    /// Download progress in `[0, 1]`
    pub progress: f64,
    pub peers: usize,
    pub download_speed: u64,
    pub upload_speed: u64,
    pub ready: bool,
    pub session_count: usize,
    pub eviction_scheduled: bool,
    /// Wall-clock time the pending eviction fires
    pub evicts_at: Option<DateTime<Utc>>,
    pub acquired_at: Option<DateTime<Utc>>,
}

impl ContentSummary {
    pub(crate) fn ready(
        content: &ContentHandle,
        session_count: usize,
        evicts_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            info_hash: content.info_hash(),
            name: content.name().to_string(),
            files: content.files().to_vec(),
            progress: content.progress(),
            peers: content.peer_count(),
            download_speed: content.download_speed(),
            upload_speed: content.upload_speed(),
            ready: true,
            session_count,
            eviction_scheduled: evicts_at.is_some(),
            evicts_at,
            acquired_at: Some(content.acquired_at()),
        }
    }

    pub(crate) fn connecting(
        info_hash: InfoHash,
        name: Option<&str>,
        session_count: usize,
    ) -> Self {
        Self {
            info_hash,
            name: name.unwrap_or_default().to_string(),
            files: Vec::new(),
            progress: 0.0,
            peers: 0,
            download_speed: 0,
            upload_speed: 0,
            ready: false,
            session_count,
            eviction_scheduled: false,
            evicts_at: None,
            acquired_at: None,
        }
    }
}

/// Lookup result for a content hash, without side effects.
#[derive(Debug, Clone)]
pub enum ContentStatus {
    /// Neither loaded nor being fetched
    NotFound,
    /// Metadata is still being fetched
    Connecting(ContentSummary),
    Ready(ContentSummary),
}

impl ContentStatus {
    /// Wire label: `not_found`, `connecting` or `ready`.
    pub fn label(&self) -> &'static str {
        match self {
            ContentStatus::NotFound => "not_found",
            ContentStatus::Connecting(_) => "connecting",
            ContentStatus::Ready(_) => "ready",
        }
    }

    pub fn summary(&self) -> Option<&ContentSummary> {
        match self {
            ContentStatus::NotFound => None,
            ContentStatus::Connecting(summary) | ContentStatus::Ready(summary) => Some(summary),
        }
    }
}
