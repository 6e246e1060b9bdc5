//! Content identity and the in-memory view of acquired content.
//!
//! An [`InfoHash`] names one piece of swarm content. A [`ContentHandle`] is
//! what the engine hands out once the swarm has produced metadata: the file
//! list, classified for streaming, plus live telemetry read through the
//! underlying swarm torrent.

pub mod magnet;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use magnet::MagnetLink;

use crate::StreamboxError;
use crate::streaming::selection::{extension_of, is_video_extension, main_video_index};
use crate::swarm::{ByteStream, SwarmError, SwarmFile, SwarmTorrent};

/// SHA-1 info hash identifying a unique piece of swarm content.
///
/// Both the 40 character hex form and the 32 character base32 form decode
/// to the same 20 bytes, so every spelling of one torrent compares equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    /// Creates InfoHash from 20-byte SHA-1 hash.
    pub fn new(hash: [u8; 20]) -> Self {
        Self(hash)
    }

    /// Returns reference to underlying 20-byte hash.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parses a hex (40 chars) or base32 (32 chars) info hash, ignoring case.
    ///
    /// # Errors
    /// - `StreamboxError::InvalidIdentifier` - Wrong length or invalid digits
    pub fn parse(input: &str) -> Result<Self, StreamboxError> {
        let trimmed = input.trim();
        let decoded = match trimmed.len() {
            40 => {
                let mut hash = [0u8; 20];
                hex::decode_to_slice(trimmed, &mut hash)
                    .ok()
                    .map(|_| hash)
            }
            32 => decode_base32(trimmed),
            _ => None,
        };

        decoded
            .map(Self)
            .ok_or_else(|| StreamboxError::InvalidIdentifier {
                input: input.to_string(),
            })
    }

    /// Returns the canonical lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for InfoHash {
    type Err = StreamboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for InfoHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for InfoHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Decodes an RFC 4648 base32 info hash (no padding, case-insensitive).
fn decode_base32(input: &str) -> Option<[u8; 20]> {
    if input.len() != 32 {
        return None;
    }

    let mut out = [0u8; 20];
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    let mut position = 0;

    for byte in input.bytes() {
        let value = match byte.to_ascii_uppercase() {
            upper @ b'A'..=b'Z' => upper - b'A',
            digit @ b'2'..=b'7' => digit - b'2' + 26,
            _ => return None,
        };
        buffer = (buffer << 5) | u32::from(value);
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out[position] = (buffer >> bits) as u8;
            position += 1;
            buffer &= (1 << bits) - 1;
        }
    }

    Some(out)
}

/// One file inside a piece of content, classified for streaming.
///
/// The index is the file's position in the swarm's file list and stays
/// stable for the lifetime of the handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub index: usize,
    pub name: String,
    pub path: String,
    pub length: u64,
    pub extension: String,
    pub is_video: bool,
}

impl FileDescriptor {
    /// Classifies a swarm file at the given list position.
    pub fn from_swarm(index: usize, file: &SwarmFile) -> Self {
        let extension = extension_of(&file.name);
        Self {
            index,
            is_video: is_video_extension(&extension),
            name: file.name.clone(),
            path: file.path.clone(),
            length: file.length,
            extension,
        }
    }
}

/// Content whose metadata is available and which can be streamed.
///
/// Owned by the content engine and shared read-only with the streaming
/// gateway. Telemetry is read live from the swarm torrent.
pub struct ContentHandle {
    info_hash: InfoHash,
    name: String,
    files: Vec<FileDescriptor>,
    acquired_at: DateTime<Utc>,
    torrent: Arc<dyn SwarmTorrent>,
}

impl ContentHandle {
    /// Builds a handle from a torrent whose metadata is ready.
    pub fn from_torrent(torrent: Arc<dyn SwarmTorrent>) -> Self {
        let files = torrent
            .files()
            .iter()
            .enumerate()
            .map(|(index, file)| FileDescriptor::from_swarm(index, file))
            .collect();

        Self {
            info_hash: torrent.info_hash(),
            name: torrent.name(),
            files,
            acquired_at: Utc::now(),
            torrent,
        }
    }

    pub fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn files(&self) -> &[FileDescriptor] {
        &self.files
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    /// Aggregate download progress in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        self.torrent.progress().clamp(0.0, 1.0)
    }

    pub fn peer_count(&self) -> usize {
        self.torrent.peer_count()
    }

    pub fn download_speed(&self) -> u64 {
        self.torrent.download_speed()
    }

    pub fn upload_speed(&self) -> u64 {
        self.torrent.upload_speed()
    }

    /// Index of the largest video file, if any.
    pub fn main_video_index(&self) -> Option<usize> {
        main_video_index(&self.files)
    }

    /// Opens an independent reader over `[start, end]` (inclusive) of a file.
    ///
    /// # Errors
    /// - `SwarmError` - The swarm could not open the file for reading
    pub fn open_range(
        &self,
        file: &FileDescriptor,
        start: u64,
        end: u64,
    ) -> Result<ByteStream, SwarmError> {
        self.torrent.open_range(file.index, start, end)
    }

    /// Releases the swarm download, optionally deleting its stored data.
    ///
    /// # Errors
    /// - `SwarmError` - The swarm failed to stop or clean up the download
    pub async fn destroy(&self, purge_storage: bool) -> Result<(), SwarmError> {
        self.torrent.destroy(purge_storage).await
    }
}

impl fmt::Debug for ContentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentHandle")
            .field("info_hash", &self.info_hash)
            .field("name", &self.name)
            .field("files", &self.files.len())
            .finish()
    }
}

/// Formats a byte count the way the file picker shows it.
pub fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let value = bytes as f64;

    if value < KIB {
        format!("{bytes} B")
    } else if value < KIB * KIB {
        format!("{:.1} KB", value / KIB)
    } else if value < KIB * KIB * KIB {
        format!("{:.2} MB", value / (KIB * KIB))
    } else {
        format!("{:.2} GB", value / (KIB * KIB * KIB))
    }
}
