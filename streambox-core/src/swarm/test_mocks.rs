//! Mock swarm engine for testing the content engine and HTTP layer.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use parking_lot::Mutex;

use super::{AddOptions, ByteStream, SwarmEngine, SwarmError, SwarmFile, SwarmTorrent, check_range};
use crate::content::{InfoHash, MagnetLink};

// Reads are split so streaming code sees more than one chunk
const MOCK_CHUNK_SIZE: usize = 64;

/// Content the mock swarm can "find peers" for.
#[derive(Debug, Clone)]
pub struct MockContent {
    pub name: String,
    pub files: Vec<(String, Bytes)>,
}

impl MockContent {
    /// Creates content with a single file.
    pub fn single(name: &str, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.to_string(),
            files: vec![(name.to_string(), data.into())],
        }
    }

    /// Creates content with several files named inside a folder called `name`.
    pub fn folder(name: &str, files: Vec<(&str, Bytes)>) -> Self {
        Self {
            name: name.to_string(),
            files: files
                .into_iter()
                .map(|(file_name, data)| (file_name.to_string(), data))
                .collect(),
        }
    }
}

/// Mock swarm engine.
///
/// Unknown content never produces metadata, so acquisitions of it hang until
/// the caller's timeout fires, just like a swarm without peers.
#[derive(Clone, Default)]
pub struct MockSwarm {
    inner: Arc<MockSwarmInner>,
}

#[derive(Default)]
struct MockSwarmInner {
    catalog: Mutex<HashMap<InfoHash, MockContent>>,
    add_calls: AtomicUsize,
    metadata_delay: Mutex<Duration>,
    add_failure: Mutex<Option<SwarmError>>,
    destroy_failure: Mutex<Option<SwarmError>>,
    destroyed: Mutex<Vec<(InfoHash, bool)>>,
    last_options: Mutex<Option<AddOptions>>,
    peer_count: AtomicUsize,
}

impl MockSwarm {
    /// Creates a new mock swarm with no content.
    pub fn new() -> Self {
        let swarm = Self::default();
        swarm.inner.peer_count.store(12, Ordering::SeqCst);
        swarm
    }

    /// Registers content under the given info hash.
    pub fn with_content(self, info_hash: InfoHash, content: MockContent) -> Self {
        self.inner.catalog.lock().insert(info_hash, content);
        self
    }

    /// Delays every metadata fetch by `delay`.
    pub fn with_metadata_delay(self, delay: Duration) -> Self {
        *self.inner.metadata_delay.lock() = delay;
        self
    }

    /// Makes every `add` call fail with `error` after the metadata delay.
    pub fn with_add_failure(self, error: SwarmError) -> Self {
        *self.inner.add_failure.lock() = Some(error);
        self
    }

    /// Makes every `destroy` call fail with `error`.
    pub fn with_destroy_failure(self, error: SwarmError) -> Self {
        *self.inner.destroy_failure.lock() = Some(error);
        self
    }

    /// Clears a failure configured with `with_add_failure`.
    pub fn clear_add_failure(&self) {
        *self.inner.add_failure.lock() = None;
    }

    /// Number of times `add` has been invoked.
    pub fn add_calls(&self) -> usize {
        self.inner.add_calls.load(Ordering::SeqCst)
    }

    /// Every `(info_hash, purge_storage)` pair passed to `destroy`, in order.
    pub fn destroyed(&self) -> Vec<(InfoHash, bool)> {
        self.inner.destroyed.lock().clone()
    }

    /// Options passed to the most recent `add` call.
    pub fn last_options(&self) -> Option<AddOptions> {
        *self.inner.last_options.lock()
    }

    /// A magnet URI for the given hash.
    pub fn magnet_for(info_hash: InfoHash) -> String {
        MagnetLink::build(info_hash, None, &[])
    }
}

#[async_trait]
impl SwarmEngine for MockSwarm {
    async fn add(
        &self,
        magnet: &MagnetLink,
        options: AddOptions,
    ) -> Result<Arc<dyn SwarmTorrent>, SwarmError> {
        self.inner.add_calls.fetch_add(1, Ordering::SeqCst);
        *self.inner.last_options.lock() = Some(options);

        let delay = *self.inner.metadata_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.inner.add_failure.lock().clone() {
            return Err(error);
        }

        let content = self.inner.catalog.lock().get(&magnet.info_hash).cloned();
        let Some(content) = content else {
            // No peers ever show up
            return std::future::pending().await;
        };

        Ok(Arc::new(MockTorrent {
            info_hash: magnet.info_hash,
            content,
            swarm: self.inner.clone(),
        }))
    }
}

struct MockTorrent {
    info_hash: InfoHash,
    content: MockContent,
    swarm: Arc<MockSwarmInner>,
}

#[async_trait]
impl SwarmTorrent for MockTorrent {
    fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    fn name(&self) -> String {
        self.content.name.clone()
    }

    fn files(&self) -> Vec<SwarmFile> {
        self.content
            .files
            .iter()
            .map(|(name, data)| SwarmFile {
                name: name.clone(),
                path: format!("{}/{}", self.content.name, name),
                length: data.len() as u64,
            })
            .collect()
    }

    fn progress(&self) -> f64 {
        0.5
    }

    fn peer_count(&self) -> usize {
        self.swarm.peer_count.load(Ordering::SeqCst)
    }

    fn open_range(
        &self,
        file_index: usize,
        start: u64,
        end: u64,
    ) -> Result<ByteStream, SwarmError> {
        let (_, data) = self
            .content
            .files
            .get(file_index)
            .ok_or(SwarmError::FileOutOfRange { index: file_index })?;
        check_range(start, end, data.len() as u64)?;

        let window = data.slice(start as usize..=end as usize);
        let chunks: Vec<Result<Bytes, std::io::Error>> = window
            .chunks(MOCK_CHUNK_SIZE)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();

        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn destroy(&self, purge_storage: bool) -> Result<(), SwarmError> {
        self.swarm
            .destroyed
            .lock()
            .push((self.info_hash, purge_storage));

        match self.swarm.destroy_failure.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
