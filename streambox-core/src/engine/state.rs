//! State owned by the content engine actor.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use super::commands::ContentEngineCommand;
use super::eviction::EvictionScheduler;
use super::registry::{ContentRegistry, Waiter};
use super::sessions::{SessionEnd, SessionTracker};
use super::{Acquisition, ContentStatus, ContentSummary, SessionId};
use crate::StreamboxError;
use crate::content::{ContentHandle, InfoHash, MagnetLink};
use crate::settings::SettingsStore;
use crate::swarm::{SwarmEngine, SwarmTorrent};

/// Registry, session tracker and eviction scheduler under one owner.
///
/// Only the actor task touches this, so no method needs a lock. Methods
/// never await swarm work; that always happens in spawned tasks.
pub(crate) struct ContentEngine {
    swarm: Arc<dyn SwarmEngine>,
    settings: Arc<SettingsStore>,
    registry: ContentRegistry,
    sessions: SessionTracker,
    eviction: EvictionScheduler,
    notifier: mpsc::UnboundedSender<ContentEngineCommand>,
}

impl ContentEngine {
    pub fn new(
        swarm: Arc<dyn SwarmEngine>,
        settings: Arc<SettingsStore>,
        notifier: mpsc::UnboundedSender<ContentEngineCommand>,
    ) -> Self {
        Self {
            swarm,
            settings,
            registry: ContentRegistry::default(),
            sessions: SessionTracker::default(),
            eviction: EvictionScheduler::new(notifier.clone()),
            notifier,
        }
    }

    /// Serves a ready handle, joins an in-flight fetch, or starts one.
    pub fn acquire(
        &mut self,
        magnet: MagnetLink,
        open_session: bool,
        responder: oneshot::Sender<Result<Acquisition, StreamboxError>>,
    ) {
        let info_hash = magnet.info_hash;

        if let Some(content) = self.registry.get(&info_hash).cloned() {
            tracing::debug!("Acquire {} served from registry", info_hash);
            self.deliver(
                Waiter {
                    open_session,
                    responder,
                },
                &content,
            );
            return;
        }

        let waiter = Waiter {
            open_session,
            responder,
        };
        if self.registry.attach(&magnet, waiter) {
            tracing::debug!("Acquire {} joined in-flight fetch", info_hash);
            return;
        }

        let settings = self.settings.current();
        let timeout = settings.metadata_timeout();
        let options = settings.add_options();
        let swarm = self.swarm.clone();
        let notifier = self.notifier.clone();

        tracing::info!(
            "Acquiring {} (timeout {}s, max connections {})",
            info_hash,
            timeout.as_secs(),
            options.max_connections
        );

        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, swarm.add(&magnet, options)).await {
                Ok(Ok(torrent)) => Ok(torrent),
                Ok(Err(e)) => Err(StreamboxError::Swarm(e)),
                Err(_) => Err(StreamboxError::MetadataTimeout { info_hash, timeout }),
            };

            let settled = ContentEngineCommand::AcquisitionSettled { info_hash, result };
            if let Err(rejected) = notifier.send(settled)
                && let ContentEngineCommand::AcquisitionSettled {
                    result: Ok(torrent),
                    ..
                } = rejected.0
            {
                // Engine is gone; nobody else will destroy this download
                spawn_destroy(info_hash, torrent);
            }
        });
    }

    /// Promotes or fails a finished fetch and answers everyone waiting on it.
    pub fn acquisition_settled(
        &mut self,
        info_hash: InfoHash,
        result: Result<Arc<dyn SwarmTorrent>, StreamboxError>,
    ) {
        let Some(pending) = self.registry.settle(&info_hash) else {
            tracing::warn!("Acquisition settled for {} with nobody waiting", info_hash);
            if let Ok(torrent) = result {
                spawn_destroy(info_hash, torrent);
            }
            return;
        };
        let elapsed = pending.started_at.elapsed();

        match result {
            Ok(torrent) => {
                let content = Arc::new(ContentHandle::from_torrent(torrent));
                tracing::info!(
                    "Content {} ready: {:?} with {} files after {}ms",
                    info_hash,
                    content.name(),
                    content.files().len(),
                    elapsed.as_millis()
                );
                self.registry.insert(content.clone());

                for waiter in pending.waiters {
                    self.deliver(waiter, &content);
                }

                if self.sessions.count(&info_hash) == 0 {
                    self.schedule_eviction(info_hash);
                }
            }
            Err(error) => {
                tracing::warn!(
                    "Acquisition of {} failed after {}ms: {}",
                    info_hash,
                    elapsed.as_millis(),
                    error
                );
                for waiter in pending.waiters {
                    let _ = waiter.responder.send(Err(error.clone()));
                }
            }
        }
    }

    /// Answers one waiter, opening its session first if it asked for one.
    fn deliver(&mut self, waiter: Waiter, content: &Arc<ContentHandle>) {
        let info_hash = content.info_hash();
        let session_id = waiter.open_session.then(|| self.start_session(info_hash));

        let delivered = waiter
            .responder
            .send(Ok(Acquisition {
                content: content.clone(),
                session_id: session_id.clone(),
            }))
            .is_ok();

        if !delivered && let Some(session_id) = session_id {
            // Caller went away before learning its session id
            tracing::debug!("Dropping orphaned session {} on {}", session_id, info_hash);
            self.end_session(info_hash, &session_id);
        }
    }

    pub fn lookup(&self, info_hash: &InfoHash) -> Option<Arc<ContentHandle>> {
        self.registry.get(info_hash).cloned()
    }

    pub fn status(&self, info_hash: &InfoHash) -> ContentStatus {
        if let Some(content) = self.registry.get(info_hash) {
            return ContentStatus::Ready(self.summarize(content));
        }
        match self.registry.pending(info_hash) {
            Some(pending) => ContentStatus::Connecting(ContentSummary::connecting(
                *info_hash,
                pending.magnet.display_name.as_deref(),
                self.sessions.count(info_hash),
            )),
            None => ContentStatus::NotFound,
        }
    }

    pub fn list_content(&self) -> Vec<ContentSummary> {
        let mut summaries: Vec<ContentSummary> = self
            .registry
            .ready()
            .map(|content| self.summarize(content))
            .collect();
        summaries.extend(self.registry.pending_entries().map(|(info_hash, pending)| {
            ContentSummary::connecting(
                *info_hash,
                pending.magnet.display_name.as_deref(),
                self.sessions.count(info_hash),
            )
        }));
        summaries.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.info_hash.as_bytes().cmp(b.info_hash.as_bytes()))
        });
        summaries
    }

    fn summarize(&self, content: &ContentHandle) -> ContentSummary {
        let info_hash = content.info_hash();
        let evicts_at = self.eviction.deadline(&info_hash).map(wall_clock);
        ContentSummary::ready(content, self.sessions.count(&info_hash), evicts_at)
    }

    /// Registers a viewer and disarms any pending eviction.
    pub fn start_session(&mut self, info_hash: InfoHash) -> SessionId {
        if self.eviction.cancel(&info_hash) {
            tracing::info!("Eviction of {} cancelled, viewer returned", info_hash);
        }
        let session_id = self.sessions.start(info_hash);
        tracing::info!(
            "Session {} started on {} ({} active)",
            session_id,
            info_hash,
            self.sessions.count(&info_hash)
        );
        session_id
    }

    /// Removes a viewer; the last one leaving arms the eviction timer.
    pub fn end_session(&mut self, info_hash: InfoHash, session_id: &SessionId) -> SessionEnd {
        let outcome = self.sessions.end(&info_hash, session_id);
        match outcome {
            SessionEnd::Removed { remaining } => {
                tracing::info!(
                    "Session {} ended on {} ({} remaining)",
                    session_id,
                    info_hash,
                    remaining
                );
                if remaining == 0 && self.registry.get(&info_hash).is_some() {
                    self.schedule_eviction(info_hash);
                }
            }
            SessionEnd::NotFound => {
                tracing::debug!("Ignoring end of unknown session {} on {}", session_id, info_hash);
            }
        }
        outcome
    }

    pub fn session_count(&self, info_hash: &InfoHash) -> usize {
        self.sessions.count(info_hash)
    }

    fn schedule_eviction(&mut self, info_hash: InfoHash) {
        let grace_period = self.settings.current().grace_period();
        self.eviction.schedule(info_hash, grace_period);
        tracing::info!(
            "Eviction of {} scheduled in {}s",
            info_hash,
            grace_period.as_secs()
        );
    }

    /// Handles a timer that elapsed, re-checking that nobody is watching.
    pub fn eviction_due(&mut self, info_hash: InfoHash, generation: u64) {
        if !self.eviction.take_due(&info_hash, generation) {
            tracing::debug!("Discarding stale eviction timer for {}", info_hash);
            return;
        }

        let viewers = self.sessions.count(&info_hash);
        if viewers > 0 {
            tracing::debug!("Eviction of {} skipped, {} viewers active", info_hash, viewers);
            return;
        }

        tracing::info!("Evicting {} after grace period", info_hash);
        self.remove(&info_hash);
    }

    /// Drops content from the registry and destroys it with storage purge.
    ///
    /// The handle is gone from the registry even if the swarm fails to clean
    /// up; that failure is only logged.
    pub fn remove(&mut self, info_hash: &InfoHash) -> bool {
        self.eviction.cancel(info_hash);
        let Some(content) = self.registry.remove(info_hash) else {
            return false;
        };

        let dropped = self.sessions.remove_all(info_hash);
        if dropped > 0 {
            tracing::warn!("Removed {} with {} sessions still open", info_hash, dropped);
        }

        tokio::spawn(async move {
            match content.destroy(true).await {
                Ok(()) => {
                    tracing::info!("Destroyed {} and purged its storage", content.info_hash())
                }
                Err(e) => tracing::warn!("Failed to destroy {}: {}", content.info_hash(), e),
            }
        });
        true
    }

    /// Cancels timers, clears sessions, fails waiters and destroys content.
    pub async fn shutdown(&mut self) {
        self.eviction.cancel_all();
        let sessions = self.sessions.total();
        self.sessions.clear();

        let (contents, pending) = self.registry.drain();
        for acquisition in pending {
            for waiter in acquisition.waiters {
                let _ = waiter.responder.send(Err(StreamboxError::EngineShutdown));
            }
        }

        tracing::info!(
            "Content engine shutting down: {} content, {} sessions",
            contents.len(),
            sessions
        );

        let results = join_all(contents.iter().map(|content| content.destroy(true))).await;
        for (content, result) in contents.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!("Failed to destroy {} on shutdown: {}", content.info_hash(), e);
            }
        }

        self.swarm.shutdown().await;
    }
}

/// Maps a timer deadline onto the wall clock for reporting.
fn wall_clock(deadline: Instant) -> DateTime<Utc> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    Utc::now() + TimeDelta::from_std(remaining).unwrap_or_else(|_| TimeDelta::zero())
}

fn spawn_destroy(info_hash: InfoHash, torrent: Arc<dyn SwarmTorrent>) {
    tokio::spawn(async move {
        if let Err(e) = torrent.destroy(true).await {
            tracing::warn!("Failed to destroy unclaimed download {}: {}", info_hash, e);
        }
    });
}
