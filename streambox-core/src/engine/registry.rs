//! Ready content and in-flight acquisitions, keyed by info hash.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::time::Instant;

use super::Acquisition;
use crate::StreamboxError;
use crate::content::{ContentHandle, InfoHash, MagnetLink};

/// A caller parked on an in-flight acquisition.
pub(crate) struct Waiter {
    pub open_session: bool,
    pub responder: oneshot::Sender<Result<Acquisition, StreamboxError>>,
}

/// One swarm fetch shared by every caller asking for the same hash.
pub(crate) struct PendingAcquisition {
    pub magnet: MagnetLink,
    pub started_at: Instant,
    pub waiters: Vec<Waiter>,
}

#[derive(Default)]
pub(crate) struct ContentRegistry {
    ready: HashMap<InfoHash, Arc<ContentHandle>>,
    pending: HashMap<InfoHash, PendingAcquisition>,
}

impl ContentRegistry {
    pub fn get(&self, info_hash: &InfoHash) -> Option<&Arc<ContentHandle>> {
        self.ready.get(info_hash)
    }

    pub fn pending(&self, info_hash: &InfoHash) -> Option<&PendingAcquisition> {
        self.pending.get(info_hash)
    }

    /// Parks `waiter` on the in-flight acquisition for `info_hash`.
    ///
    /// Returns `true` when a fetch was already running. Otherwise a new
    /// pending entry is created and the caller must start the fetch.
    pub fn attach(&mut self, magnet: &MagnetLink, waiter: Waiter) -> bool {
        match self.pending.entry(magnet.info_hash) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().waiters.push(waiter);
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(PendingAcquisition {
                    magnet: magnet.clone(),
                    started_at: Instant::now(),
                    waiters: vec![waiter],
                });
                false
            }
        }
    }

    /// Removes the pending entry, whatever the outcome of the fetch.
    pub fn settle(&mut self, info_hash: &InfoHash) -> Option<PendingAcquisition> {
        self.pending.remove(info_hash)
    }

    pub fn insert(&mut self, content: Arc<ContentHandle>) {
        self.ready.insert(content.info_hash(), content);
    }

    pub fn remove(&mut self, info_hash: &InfoHash) -> Option<Arc<ContentHandle>> {
        self.ready.remove(info_hash)
    }

    pub fn ready(&self) -> impl Iterator<Item = &Arc<ContentHandle>> {
        self.ready.values()
    }

    pub fn pending_entries(&self) -> impl Iterator<Item = (&InfoHash, &PendingAcquisition)> {
        self.pending.iter()
    }

    /// Empties both maps for teardown.
    pub fn drain(&mut self) -> (Vec<Arc<ContentHandle>>, Vec<PendingAcquisition>) {
        (
            self.ready.drain().map(|(_, content)| content).collect(),
            self.pending.drain().map(|(_, pending)| pending).collect(),
        )
    }
}
