//! Actor implementation for the content engine.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::commands::ContentEngineCommand;
use super::handle::ContentEngineHandle;
use super::state::ContentEngine;
use crate::settings::SettingsStore;
use crate::swarm::SwarmEngine;

/// Spawns the content engine actor and returns its handle.
///
/// The actor owns the content registry, session tracker and eviction
/// scheduler and processes commands one at a time. Settings are read from
/// `settings` whenever an acquisition starts or an eviction is scheduled.
///
/// # Examples
/// ```rust,no_run
/// use std::sync::Arc;
/// use streambox_core::engine::{ContentEngineHandle, spawn_content_engine};
/// use streambox_core::settings::{EngineSettings, SettingsStore};
/// use streambox_core::swarm::SwarmEngine;
///
/// fn start(swarm: Arc<dyn SwarmEngine>) -> ContentEngineHandle {
///     let settings = Arc::new(SettingsStore::in_memory(EngineSettings::default()));
///     spawn_content_engine(swarm, settings)
/// }
/// ```
pub fn spawn_content_engine(
    swarm: Arc<dyn SwarmEngine>,
    settings: Arc<SettingsStore>,
) -> ContentEngineHandle {
    let (sender, receiver) = mpsc::channel(100);
    let (notifier, notifications) = mpsc::unbounded_channel();
    let engine = ContentEngine::new(swarm, settings, notifier);

    tokio::spawn(async move {
        run_actor_loop(engine, receiver, notifications).await;
    });

    ContentEngineHandle::new(sender)
}

/// Runs the main actor message processing loop.
///
/// Exits on a `Shutdown` command or once every handle has been dropped. Both
/// paths release all content before the task ends.
async fn run_actor_loop(
    mut engine: ContentEngine,
    mut receiver: mpsc::Receiver<ContentEngineCommand>,
    mut notifications: mpsc::UnboundedReceiver<ContentEngineCommand>,
) {
    tracing::debug!("Content engine actor started");

    loop {
        tokio::select! {
            command = receiver.recv() => {
                let Some(command) = command else {
                    tracing::debug!("All engine handles dropped");
                    engine.shutdown().await;
                    break;
                };
                if !handle_command(&mut engine, command).await {
                    break;
                }
            }
            Some(command) = notifications.recv() => {
                if !handle_command(&mut engine, command).await {
                    break;
                }
            }
        }
    }

    tracing::debug!("Content engine actor stopped");
}

/// Handles a single command for the content engine.
/// Returns true to continue processing, false to shutdown.
async fn handle_command(engine: &mut ContentEngine, command: ContentEngineCommand) -> bool {
    tracing::trace!(?command, "Content engine command");

    match command {
        ContentEngineCommand::Acquire {
            magnet,
            open_session,
            responder,
        } => {
            engine.acquire(magnet, open_session, responder);
        }

        ContentEngineCommand::Lookup {
            info_hash,
            responder,
        } => {
            let _ = responder.send(engine.lookup(&info_hash));
        }

        ContentEngineCommand::Status {
            info_hash,
            responder,
        } => {
            let _ = responder.send(engine.status(&info_hash));
        }

        ContentEngineCommand::StartSession {
            info_hash,
            responder,
        } => {
            let session_id = engine.start_session(info_hash);
            if let Err(session_id) = responder.send(session_id) {
                engine.end_session(info_hash, &session_id);
            }
        }

        ContentEngineCommand::EndSession {
            info_hash,
            session_id,
            responder,
        } => {
            let _ = responder.send(engine.end_session(info_hash, &session_id));
        }

        ContentEngineCommand::SessionCount {
            info_hash,
            responder,
        } => {
            let _ = responder.send(engine.session_count(&info_hash));
        }

        ContentEngineCommand::ListContent { responder } => {
            let _ = responder.send(engine.list_content());
        }

        ContentEngineCommand::Remove {
            info_hash,
            responder,
        } => {
            let removed = engine.remove(&info_hash);
            if removed {
                tracing::info!("Content {} removed on request", info_hash);
            }
            let _ = responder.send(removed);
        }

        ContentEngineCommand::AcquisitionSettled { info_hash, result } => {
            engine.acquisition_settled(info_hash, result);
        }

        ContentEngineCommand::EvictionDue {
            info_hash,
            generation,
        } => {
            engine.eviction_due(info_hash, generation);
        }

        ContentEngineCommand::Shutdown { responder } => {
            engine.shutdown().await;
            let _ = responder.send(());
            return false;
        }
    }

    true
}
