//! Handle for communicating with the content engine actor.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::commands::ContentEngineCommand;
use super::sessions::SessionEnd;
use super::{Acquisition, ContentStatus, ContentSummary, SessionId};
use crate::StreamboxError;
use crate::content::{ContentHandle, InfoHash, MagnetLink};

/// Handle for communicating with the content engine actor.
///
/// Cheap to clone and safe to share across request handlers. Every method
/// fails with `StreamboxError::EngineShutdown` once the actor has stopped.
#[derive(Clone)]
pub struct ContentEngineHandle {
    sender: mpsc::Sender<ContentEngineCommand>,
}

impl ContentEngineHandle {
    /// Creates a new handle with the given command sender.
    pub fn new(sender: mpsc::Sender<ContentEngineCommand>) -> Self {
        Self { sender }
    }

    /// Resolves content by magnet URI or bare info hash.
    ///
    /// Returns the ready handle if one exists, otherwise waits on the single
    /// shared fetch for that hash. Concurrent callers for one hash cause one
    /// swarm `add` call between them.
    ///
    /// # Errors
    /// - `StreamboxError::InvalidIdentifier` - Not a magnet URI or info hash; the swarm is never contacted
    /// - `StreamboxError::MetadataTimeout` - Swarm produced no metadata in time
    /// - `StreamboxError::Swarm` - Swarm rejected the content
    pub async fn acquire(&self, uri: &str) -> Result<Arc<ContentHandle>, StreamboxError> {
        let magnet = MagnetLink::from_identifier(uri)?;
        let acquisition = self.request_acquisition(magnet, false).await?;
        Ok(acquisition.content)
    }

    /// Resolves content and starts a viewer session on it in one step.
    ///
    /// The session is registered in the same engine turn that delivers the
    /// content, so an idle eviction can never slip in between.
    ///
    /// # Errors
    /// Same as [`ContentEngineHandle::acquire`].
    pub async fn open_session(
        &self,
        uri: &str,
    ) -> Result<(Arc<ContentHandle>, SessionId), StreamboxError> {
        let magnet = MagnetLink::from_identifier(uri)?;
        let acquisition = self.request_acquisition(magnet, true).await?;
        let session_id = acquisition
            .session_id
            .ok_or(StreamboxError::EngineShutdown)?;
        Ok((acquisition.content, session_id))
    }

    async fn request_acquisition(
        &self,
        magnet: MagnetLink,
        open_session: bool,
    ) -> Result<Acquisition, StreamboxError> {
        let (responder, rx) = oneshot::channel();
        self.send(ContentEngineCommand::Acquire {
            magnet,
            open_session,
            responder,
        })
        .await?;
        rx.await.map_err(|_| StreamboxError::EngineShutdown)?
    }

    /// Ready content for a hash. Never starts an acquisition.
    ///
    /// # Errors
    /// - `StreamboxError::EngineShutdown` - Engine actor has stopped
    pub async fn lookup(
        &self,
        info_hash: InfoHash,
    ) -> Result<Option<Arc<ContentHandle>>, StreamboxError> {
        let (responder, rx) = oneshot::channel();
        self.send(ContentEngineCommand::Lookup {
            info_hash,
            responder,
        })
        .await?;
        rx.await.map_err(|_| StreamboxError::EngineShutdown)
    }

    /// Whether content is unknown, connecting or ready. No side effects.
    ///
    /// # Errors
    /// - `StreamboxError::EngineShutdown` - Engine actor has stopped
    pub async fn status(&self, info_hash: InfoHash) -> Result<ContentStatus, StreamboxError> {
        let (responder, rx) = oneshot::channel();
        self.send(ContentEngineCommand::Status {
            info_hash,
            responder,
        })
        .await?;
        rx.await.map_err(|_| StreamboxError::EngineShutdown)
    }

    /// Registers a viewer, cancelling any pending eviction of the content.
    ///
    /// # Errors
    /// - `StreamboxError::EngineShutdown` - Engine actor has stopped
    pub async fn start_session(&self, info_hash: InfoHash) -> Result<SessionId, StreamboxError> {
        let (responder, rx) = oneshot::channel();
        self.send(ContentEngineCommand::StartSession {
            info_hash,
            responder,
        })
        .await?;
        rx.await.map_err(|_| StreamboxError::EngineShutdown)
    }

    /// Ends a viewer session. Unknown sessions are ignored.
    ///
    /// When the last session on the content ends, eviction is scheduled after
    /// the configured grace period.
    ///
    /// # Errors
    /// - `StreamboxError::EngineShutdown` - Engine actor has stopped
    pub async fn end_session(
        &self,
        info_hash: InfoHash,
        session_id: SessionId,
    ) -> Result<SessionEnd, StreamboxError> {
        let (responder, rx) = oneshot::channel();
        self.send(ContentEngineCommand::EndSession {
            info_hash,
            session_id,
            responder,
        })
        .await?;
        rx.await.map_err(|_| StreamboxError::EngineShutdown)
    }

    /// # Errors
    /// - `StreamboxError::EngineShutdown` - Engine actor has stopped
    pub async fn session_count(&self, info_hash: InfoHash) -> Result<usize, StreamboxError> {
        let (responder, rx) = oneshot::channel();
        self.send(ContentEngineCommand::SessionCount {
            info_hash,
            responder,
        })
        .await?;
        rx.await.map_err(|_| StreamboxError::EngineShutdown)
    }

    /// Every loaded or connecting piece of content, sorted by name.
    ///
    /// # Errors
    /// - `StreamboxError::EngineShutdown` - Engine actor has stopped
    pub async fn list_content(&self) -> Result<Vec<ContentSummary>, StreamboxError> {
        let (responder, rx) = oneshot::channel();
        self.send(ContentEngineCommand::ListContent { responder })
            .await?;
        rx.await.map_err(|_| StreamboxError::EngineShutdown)
    }

    /// Removes content immediately, dropping its sessions and purging storage.
    ///
    /// Returns whether the content was loaded.
    ///
    /// # Errors
    /// - `StreamboxError::EngineShutdown` - Engine actor has stopped
    pub async fn remove(&self, info_hash: InfoHash) -> Result<bool, StreamboxError> {
        let (responder, rx) = oneshot::channel();
        self.send(ContentEngineCommand::Remove {
            info_hash,
            responder,
        })
        .await?;
        rx.await.map_err(|_| StreamboxError::EngineShutdown)
    }

    /// Stops the engine, destroying all content and purging its storage.
    ///
    /// Waiters on in-flight acquisitions receive `EngineShutdown`.
    ///
    /// # Errors
    /// - `StreamboxError::EngineShutdown` - Engine actor had already stopped
    pub async fn shutdown(&self) -> Result<(), StreamboxError> {
        let (responder, rx) = oneshot::channel();
        self.send(ContentEngineCommand::Shutdown { responder })
            .await?;
        rx.await.map_err(|_| StreamboxError::EngineShutdown)
    }

    /// Whether the actor is still accepting commands.
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    async fn send(&self, cmd: ContentEngineCommand) -> Result<(), StreamboxError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| StreamboxError::EngineShutdown)
    }
}
