//! Boundary to the external swarm engine.
//!
//! The engine that actually speaks BitTorrent (peer discovery, piece
//! selection, wire protocol) lives behind these traits. Streambox only needs
//! to add content by magnet URI, read its file list, open independent byte
//! range readers, watch telemetry, and destroy the download when done.

#[cfg(any(test, feature = "test-utils"))]
pub mod test_mocks;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use thiserror::Error;

use crate::content::{InfoHash, MagnetLink};

/// Byte stream over one file range, as produced by the swarm.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// One entry in a torrent's file list as reported by the swarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwarmFile {
    pub name: String,
    pub path: String,
    pub length: u64,
}

/// Per-acquisition engine limits, taken from the current settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOptions {
    /// Maximum concurrent peer connections for this download
    pub max_connections: usize,
    /// Download bandwidth limit in bytes per second (None = unlimited)
    pub download_limit: Option<u64>,
    /// Upload bandwidth limit in bytes per second (None = unlimited)
    pub upload_limit: Option<u64>,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            max_connections: 55,
            download_limit: None,
            upload_limit: None,
        }
    }
}

/// Errors reported by a swarm engine adapter.
#[derive(Debug, Clone, Error)]
pub enum SwarmError {
    #[error("Failed to fetch metadata: {reason}")]
    Metadata { reason: String },

    #[error("File index {index} out of range")]
    FileOutOfRange { index: usize },

    #[error("Invalid read range {start}-{end} for file of {length} bytes")]
    InvalidRange { start: u64, end: u64, length: u64 },

    #[error("Storage error: {reason}")]
    Storage { reason: String },

    #[error("Swarm engine unavailable: {reason}")]
    Unavailable { reason: String },
}

/// A swarm engine capable of fetching content by magnet URI.
#[async_trait]
pub trait SwarmEngine: Send + Sync {
    /// Adds content and resolves once its metadata (file list) is known.
    ///
    /// May take arbitrarily long when the swarm has no peers; callers bound it
    /// with their own timeout and drop the future to give up.
    ///
    /// # Errors
    /// - `SwarmError::Metadata` - The swarm rejected the content or its metadata
    /// - `SwarmError::Unavailable` - The engine is not running
    async fn add(
        &self,
        magnet: &MagnetLink,
        options: AddOptions,
    ) -> Result<Arc<dyn SwarmTorrent>, SwarmError>;

    /// Stops the engine and releases every download it still holds.
    async fn shutdown(&self) {}
}

/// One piece of content held by the swarm engine.
#[async_trait]
pub trait SwarmTorrent: Send + Sync {
    fn info_hash(&self) -> InfoHash;

    /// Human readable name, empty until metadata arrives.
    fn name(&self) -> String;

    fn files(&self) -> Vec<SwarmFile>;

    /// Download progress in `[0, 1]`.
    fn progress(&self) -> f64;

    fn peer_count(&self) -> usize;

    /// Current download rate in bytes per second.
    fn download_speed(&self) -> u64 {
        0
    }

    /// Current upload rate in bytes per second.
    fn upload_speed(&self) -> u64 {
        0
    }

    /// Opens a reader over `[start, end]` (inclusive) of one file.
    ///
    /// Every call returns an independent reader; many may be open on the same
    /// file at once.
    ///
    /// # Errors
    /// - `SwarmError::FileOutOfRange` - No file at `file_index`
    /// - `SwarmError::InvalidRange` - Range lies outside the file
    fn open_range(&self, file_index: usize, start: u64, end: u64)
    -> Result<ByteStream, SwarmError>;

    /// Stops the download. With `purge_storage` its on-disk data is deleted.
    ///
    /// # Errors
    /// - `SwarmError::Storage` - Stored data could not be removed
    async fn destroy(&self, purge_storage: bool) -> Result<(), SwarmError>;
}

/// Checks that `[start, end]` addresses bytes inside a file of `length` bytes.
///
/// # Errors
/// - `SwarmError::InvalidRange` - Range is empty, inverted or past the end
pub fn check_range(start: u64, end: u64, length: u64) -> Result<(), SwarmError> {
    if start > end || end >= length {
        return Err(SwarmError::InvalidRange { start, end, length });
    }
    Ok(())
}
