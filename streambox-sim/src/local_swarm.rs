//! Swarm engine backed by a local media directory.
//!
//! Content is resolved by hashing library entry names, so a magnet link built
//! from [`LibraryEntry::magnet_uri`] always finds its entry. Hashes with no
//! matching entry behave like content with no peers: `add` never resolves.
//! After metadata arrives a background task copies the files into the cache
//! directory at the configured download rate, which drives the reported
//! progress and speed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use parking_lot::Mutex;
use streambox_core::config::SimulationConfig;
use streambox_core::swarm::{AddOptions, ByteStream, SwarmFile, check_range};
use streambox_core::{InfoHash, MagnetLink, SwarmEngine, SwarmError, SwarmTorrent};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::library::{LibraryEntry, LibraryFile, find_entry, scan_library};

/// Size of chunks read from library files.
const CHUNK_SIZE: usize = 256 * 1024; // 256KB

/// Window over which the download speed is averaged.
const SPEED_WINDOW: Duration = Duration::from_secs(1);

type CopyTasks = Arc<Mutex<HashMap<InfoHash, JoinHandle<()>>>>;

/// Directory-backed swarm engine for development and demos.
pub struct LocalSwarm {
    config: SimulationConfig,
    cache_dir: PathBuf,
    copy_tasks: CopyTasks,
}

impl LocalSwarm {
    /// Creates a swarm serving `config.library_dir`, caching into `cache_dir`.
    pub fn new(config: SimulationConfig, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            cache_dir: cache_dir.into(),
            copy_tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn library_dir(&self) -> &Path {
        &self.config.library_dir
    }

    /// Every piece of content this swarm can serve.
    ///
    /// # Errors
    /// - `std::io::Error` - Library directory is unreadable
    pub async fn catalog(&self) -> std::io::Result<Vec<LibraryEntry>> {
        scan_library(&self.config.library_dir).await
    }

    fn simulated_peers(&self, max_connections: usize) -> usize {
        let SimulationConfig {
            min_peers,
            max_peers,
            ..
        } = self.config;
        let peers = if min_peers >= max_peers {
            min_peers
        } else {
            rand::random_range(min_peers..=max_peers)
        };
        peers.min(max_connections)
    }
}

#[async_trait]
impl SwarmEngine for LocalSwarm {
    async fn add(
        &self,
        magnet: &MagnetLink,
        options: AddOptions,
    ) -> Result<Arc<dyn SwarmTorrent>, SwarmError> {
        tokio::time::sleep(self.config.metadata_delay).await;

        let entry = find_entry(&self.config.library_dir, magnet.info_hash)
            .await
            .map_err(|e| SwarmError::Unavailable {
                reason: format!(
                    "library {} unreadable: {e}",
                    self.config.library_dir.display()
                ),
            })?;

        let Some(entry) = entry else {
            tracing::debug!("No library entry for {}, waiting for peers", magnet.info_hash);
            return std::future::pending().await;
        };

        let peers = self.simulated_peers(options.max_connections);
        let torrent = Arc::new(LocalTorrent {
            storage_dir: self.cache_dir.join(entry.info_hash.to_hex()),
            entry,
            peers,
            downloaded: Arc::new(AtomicU64::new(0)),
            download_speed: Arc::new(AtomicU64::new(0)),
            copy_tasks: Arc::clone(&self.copy_tasks),
        });

        let task = tokio::spawn(copy_to_cache(
            torrent.entry.files.clone(),
            torrent.storage_dir.clone(),
            options.download_limit,
            Arc::clone(&torrent.downloaded),
            Arc::clone(&torrent.download_speed),
        ));
        if let Some(previous) = self.copy_tasks.lock().insert(torrent.entry.info_hash, task) {
            previous.abort();
        }

        tracing::info!(
            "Local swarm serving '{}' ({} files, {} peers)",
            torrent.entry.name,
            torrent.entry.files.len(),
            peers
        );
        Ok(torrent)
    }

    async fn shutdown(&self) {
        let tasks: Vec<_> = self.copy_tasks.lock().drain().map(|(_, task)| task).collect();
        for task in tasks {
            task.abort();
            let _ = task.await;
        }
        tracing::debug!("Local swarm stopped");
    }
}

/// One library entry being served by [`LocalSwarm`].
pub struct LocalTorrent {
    entry: LibraryEntry,
    storage_dir: PathBuf,
    peers: usize,
    downloaded: Arc<AtomicU64>,
    download_speed: Arc<AtomicU64>,
    copy_tasks: CopyTasks,
}

impl LocalTorrent {
    /// Where this content is cached on disk.
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }
}

#[async_trait]
impl SwarmTorrent for LocalTorrent {
    fn info_hash(&self) -> InfoHash {
        self.entry.info_hash
    }

    fn name(&self) -> String {
        self.entry.name.clone()
    }

    fn files(&self) -> Vec<SwarmFile> {
        self.entry
            .files
            .iter()
            .map(|file| SwarmFile {
                name: file.name.clone(),
                path: file.relative_path.clone(),
                length: file.length,
            })
            .collect()
    }

    fn progress(&self) -> f64 {
        let total = self.entry.total_size();
        if total == 0 {
            return 1.0;
        }
        self.downloaded.load(Ordering::Relaxed) as f64 / total as f64
    }

    fn peer_count(&self) -> usize {
        self.peers
    }

    fn download_speed(&self) -> u64 {
        self.download_speed.load(Ordering::Relaxed)
    }

    fn open_range(
        &self,
        file_index: usize,
        start: u64,
        end: u64,
    ) -> Result<ByteStream, SwarmError> {
        let file = self
            .entry
            .files
            .get(file_index)
            .ok_or(SwarmError::FileOutOfRange { index: file_index })?;
        check_range(start, end, file.length)?;

        Ok(read_range(file.absolute_path.clone(), start, end))
    }

    async fn destroy(&self, purge_storage: bool) -> Result<(), SwarmError> {
        let task = self.copy_tasks.lock().remove(&self.entry.info_hash);
        if let Some(task) = task {
            task.abort();
            let _ = task.await;
        }

        if purge_storage {
            match tokio::fs::remove_dir_all(&self.storage_dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(SwarmError::Storage {
                        reason: format!("{}: {e}", self.storage_dir.display()),
                    });
                }
            }
        }

        tracing::debug!(
            "Local torrent '{}' destroyed (purge: {})",
            self.entry.name,
            purge_storage
        );
        Ok(())
    }
}

struct RangeReader {
    path: PathBuf,
    file: Option<File>,
    position: u64,
    end: u64,
    done: bool,
}

impl RangeReader {
    async fn next_chunk(&mut self) -> std::io::Result<Bytes> {
        let file = match self.file.take() {
            Some(file) => file,
            None => {
                let mut file = File::open(&self.path).await?;
                file.seek(SeekFrom::Start(self.position)).await?;
                file
            }
        };
        let file = self.file.insert(file);

        let remaining = self.end - self.position + 1;
        let want = remaining.min(CHUNK_SIZE as u64) as usize;
        let mut buffer = vec![0u8; want];
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("{} ended at byte {}", self.path.display(), self.position),
            ));
        }

        buffer.truncate(read);
        self.position += read as u64;
        Ok(Bytes::from(buffer))
    }
}

/// Streams `[start, end]` of a file in chunks, stopping after the first error.
fn read_range(path: PathBuf, start: u64, end: u64) -> ByteStream {
    let reader = RangeReader {
        path,
        file: None,
        position: start,
        end,
        done: false,
    };

    Box::pin(stream::unfold(reader, |mut reader| async move {
        if reader.done || reader.position > reader.end {
            return None;
        }
        match reader.next_chunk().await {
            Ok(chunk) => Some((Ok(chunk), reader)),
            Err(e) => {
                reader.done = true;
                Some((Err(e), reader))
            }
        }
    }))
}

/// Copies library files into the cache, throttled to `download_limit` bytes/s.
async fn copy_to_cache(
    files: Vec<LibraryFile>,
    storage_dir: PathBuf,
    download_limit: Option<u64>,
    downloaded: Arc<AtomicU64>,
    download_speed: Arc<AtomicU64>,
) {
    let mut meter = SpeedMeter::new(download_speed);

    for file in &files {
        if let Err(e) = copy_file(file, &storage_dir, download_limit, &downloaded, &mut meter).await
        {
            tracing::warn!("Failed to cache {}: {}", file.relative_path, e);
            meter.reset();
            return;
        }
    }

    meter.reset();
    tracing::debug!("Cached {} files into {}", files.len(), storage_dir.display());
}

async fn copy_file(
    file: &LibraryFile,
    storage_dir: &Path,
    download_limit: Option<u64>,
    downloaded: &AtomicU64,
    meter: &mut SpeedMeter,
) -> std::io::Result<()> {
    let destination = storage_dir.join(&file.relative_path);
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut source = File::open(&file.absolute_path).await?;
    let mut target = File::create(&destination).await?;
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let read = source.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        target.write_all(&buffer[..read]).await?;
        downloaded.fetch_add(read as u64, Ordering::Relaxed);
        meter.record(read as u64);

        if let Some(limit) = download_limit.filter(|limit| *limit > 0) {
            tokio::time::sleep(Duration::from_secs_f64(read as f64 / limit as f64)).await;
        }
    }

    target.flush().await
}

struct SpeedMeter {
    output: Arc<AtomicU64>,
    window_start: Instant,
    window_bytes: u64,
}

impl SpeedMeter {
    fn new(output: Arc<AtomicU64>) -> Self {
        Self {
            output,
            window_start: Instant::now(),
            window_bytes: 0,
        }
    }

    fn record(&mut self, bytes: u64) {
        self.window_bytes += bytes;
        let elapsed = self.window_start.elapsed();
        if elapsed >= SPEED_WINDOW {
            let rate = self.window_bytes as f64 / elapsed.as_secs_f64();
            self.output.store(rate as u64, Ordering::Relaxed);
            self.window_start = Instant::now();
            self.window_bytes = 0;
        }
    }

    fn reset(&mut self) {
        self.output.store(0, Ordering::Relaxed);
        self.window_bytes = 0;
    }
}
