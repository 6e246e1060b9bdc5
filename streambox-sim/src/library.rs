//! Media library scanning.
//!
//! Every top-level entry of the library directory is one piece of content:
//! a single file becomes single-file content, a directory becomes
//! multi-file content with its files listed in path order.

use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};
use streambox_core::{InfoHash, MagnetLink};

const HASH_NAMESPACE: &[u8] = b"streambox-local:";

/// One file of library content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryFile {
    pub name: String,
    /// Path relative to the library root, `/` separated
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub length: u64,
}

/// One piece of content found in the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    pub info_hash: InfoHash,
    pub name: String,
    pub files: Vec<LibraryFile>,
}

impl LibraryEntry {
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|file| file.length).sum()
    }

    /// Magnet URI that resolves to this entry.
    pub fn magnet_uri(&self) -> String {
        MagnetLink::build(self.info_hash, Some(&self.name), &[])
    }
}

/// Stable content hash for a library entry name.
pub fn content_hash(name: &str) -> InfoHash {
    let mut hasher = Sha1::new();
    hasher.update(HASH_NAMESPACE);
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();

    let mut hash = [0u8; 20];
    hash.copy_from_slice(&digest[..20]);
    InfoHash::new(hash)
}

/// Lists every piece of content in `library_dir`, sorted by name.
///
/// Hidden entries and empty directories are skipped.
///
/// # Errors
/// - `std::io::Error` - Library directory or one of its entries is unreadable
pub async fn scan_library(library_dir: &Path) -> std::io::Result<Vec<LibraryEntry>> {
    let mut entries = Vec::new();
    let mut dir = tokio::fs::read_dir(library_dir).await?;

    while let Some(entry) = dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }

        let path = entry.path();
        let metadata = entry.metadata().await?;
        let files = if metadata.is_dir() {
            collect_files(library_dir, &path).await?
        } else {
            vec![LibraryFile {
                name: name.clone(),
                relative_path: name.clone(),
                absolute_path: path,
                length: metadata.len(),
            }]
        };

        if files.is_empty() {
            continue;
        }
        entries.push(LibraryEntry {
            info_hash: content_hash(&name),
            name,
            files,
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Finds the library entry with the given hash.
///
/// # Errors
/// - `std::io::Error` - Library directory is unreadable
pub async fn find_entry(
    library_dir: &Path,
    info_hash: InfoHash,
) -> std::io::Result<Option<LibraryEntry>> {
    let entries = scan_library(library_dir).await?;
    Ok(entries.into_iter().find(|entry| entry.info_hash == info_hash))
}

async fn collect_files(root: &Path, dir: &Path) -> std::io::Result<Vec<LibraryFile>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut reader = tokio::fs::read_dir(&current).await?;
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }

            let path = entry.path();
            let metadata = entry.metadata().await?;
            if metadata.is_dir() {
                pending.push(path);
                continue;
            }

            let relative_path = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .components()
                .map(|part| part.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push(LibraryFile {
                name,
                relative_path,
                absolute_path: path,
                length: metadata.len(),
            });
        }
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(files)
}
