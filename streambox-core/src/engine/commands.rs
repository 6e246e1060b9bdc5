//! Command definitions for the content engine actor.

use std::sync::Arc;

use tokio::sync::oneshot;

use super::sessions::SessionEnd;
use super::{Acquisition, ContentStatus, ContentSummary, SessionId};
use crate::StreamboxError;
use crate::content::{ContentHandle, InfoHash, MagnetLink};
use crate::swarm::SwarmTorrent;

/// Commands that can be sent to the content engine actor.
///
/// Requests carry a `oneshot` responder. Internal notifications from spawned
/// acquisition and timer tasks carry none.
pub enum ContentEngineCommand {
    /// Resolve content, reusing a ready handle or an in-flight fetch.
    Acquire {
        magnet: MagnetLink,
        /// Start a session in the same actor turn that delivers the handle
        open_session: bool,
        responder: oneshot::Sender<Result<Acquisition, StreamboxError>>,
    },
    /// Ready content for a hash, without acquiring.
    Lookup {
        info_hash: InfoHash,
        responder: oneshot::Sender<Option<Arc<ContentHandle>>>,
    },
    Status {
        info_hash: InfoHash,
        responder: oneshot::Sender<ContentStatus>,
    },
    StartSession {
        info_hash: InfoHash,
        responder: oneshot::Sender<SessionId>,
    },
    EndSession {
        info_hash: InfoHash,
        session_id: SessionId,
        responder: oneshot::Sender<SessionEnd>,
    },
    SessionCount {
        info_hash: InfoHash,
        responder: oneshot::Sender<usize>,
    },
    ListContent {
        responder: oneshot::Sender<Vec<ContentSummary>>,
    },
    /// Drop content immediately and purge its storage.
    Remove {
        info_hash: InfoHash,
        responder: oneshot::Sender<bool>,
    },
    /// Tear down every timer, session and handle, then stop the actor.
    Shutdown { responder: oneshot::Sender<()> },
    /// Internal: a spawned acquisition finished or timed out.
    AcquisitionSettled {
        info_hash: InfoHash,
        result: Result<Arc<dyn SwarmTorrent>, StreamboxError>,
    },
    /// Internal: an eviction timer elapsed.
    EvictionDue { info_hash: InfoHash, generation: u64 },
}

impl std::fmt::Debug for ContentEngineCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentEngineCommand::Acquire {
                magnet,
                open_session,
                ..
            } => f
                .debug_struct("Acquire")
                .field("info_hash", &magnet.info_hash)
                .field("open_session", open_session)
                .finish(),
            ContentEngineCommand::Lookup { info_hash, .. } => {
                f.debug_struct("Lookup").field("info_hash", info_hash).finish()
            }
            ContentEngineCommand::Status { info_hash, .. } => {
                f.debug_struct("Status").field("info_hash", info_hash).finish()
            }
            ContentEngineCommand::StartSession { info_hash, .. } => f
                .debug_struct("StartSession")
                .field("info_hash", info_hash)
                .finish(),
            ContentEngineCommand::EndSession {
                info_hash,
                session_id,
                ..
            } => f
                .debug_struct("EndSession")
                .field("info_hash", info_hash)
                .field("session_id", session_id)
                .finish(),
            ContentEngineCommand::SessionCount { info_hash, .. } => f
                .debug_struct("SessionCount")
                .field("info_hash", info_hash)
                .finish(),
            ContentEngineCommand::ListContent { .. } => f.write_str("ListContent"),
            ContentEngineCommand::Remove { info_hash, .. } => {
                f.debug_struct("Remove").field("info_hash", info_hash).finish()
            }
            ContentEngineCommand::Shutdown { .. } => f.write_str("Shutdown"),
            ContentEngineCommand::AcquisitionSettled { info_hash, result } => f
                .debug_struct("AcquisitionSettled")
                .field("info_hash", info_hash)
                .field("ok", &result.is_ok())
                .finish(),
            ContentEngineCommand::EvictionDue {
                info_hash,
                generation,
            } => f
                .debug_struct("EvictionDue")
                .field("info_hash", info_hash)
                .field("generation", generation)
                .finish(),
        }
    }
}
