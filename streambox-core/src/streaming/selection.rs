//! Video file classification and selection.

use crate::StreamboxError;
use crate::content::FileDescriptor;

/// Extensions treated as playable video, lowercase.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "webm", "mov", "m4v", "wmv", "flv"];

const DEFAULT_VIDEO_MIME: &str = "video/mp4";

/// Lowercase extension of a file name, or an empty string when there is none.
pub fn extension_of(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    }
}

pub fn is_video_extension(extension: &str) -> bool {
    VIDEO_EXTENSIONS.contains(&extension)
}

/// Content type for a file extension.
///
/// Unknown extensions fall back to `video/mp4`, which browsers will at least
/// attempt to play.
pub fn mime_type(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        _ => DEFAULT_VIDEO_MIME,
    }
}

/// Index of the largest video file. Ties go to the earliest file.
pub fn main_video_index(files: &[FileDescriptor]) -> Option<usize> {
    files
        .iter()
        .filter(|file| file.is_video)
        .fold(None::<&FileDescriptor>, |best, file| match best {
            Some(current) if current.length >= file.length => Some(current),
            _ => Some(file),
        })
        .map(|file| file.index)
}

/// Picks the file to stream.
///
/// An explicit index selects that file whatever its type; otherwise the
/// largest video wins.
///
/// # Errors
/// - `StreamboxError::NotFound` - Index out of range, or no video file present
pub fn select_file(
    files: &[FileDescriptor],
    requested: Option<usize>,
) -> Result<&FileDescriptor, StreamboxError> {
    match requested {
        Some(index) => files
            .get(index)
            .ok_or_else(|| StreamboxError::not_found(format!("File index {index}"))),
        None => main_video_index(files)
            .and_then(|index| files.get(index))
            .ok_or_else(|| StreamboxError::not_found("Video file")),
    }
}
