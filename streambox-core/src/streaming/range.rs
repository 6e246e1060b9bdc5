//! `Range` header resolution for media streaming.
//!
//! Only the first `bytes=<start>-<end>` window is honored. Parsing is
//! lenient: a header that cannot be satisfied falls back to the whole file
//! instead of a 416, which keeps naive players working.

use std::fmt;

/// Inclusive byte window inside a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Whole file, or `None` for an empty file.
    pub fn full(file_length: u64) -> Option<Self> {
        file_length.checked_sub(1).map(|end| Self { start: 0, end })
    }

    /// Number of bytes covered, always at least one.
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Content-Range` response header.
    pub fn content_range(&self, file_length: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, file_length)
    }
}

/// Why a `Range` header was replaced by the whole file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeFallback {
    /// Not of the form `bytes=<start>-<end>`, or no start offset
    Malformed,
    /// Start lies past the end of the file or past the requested end
    Unsatisfiable,
}

impl fmt::Display for RangeFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeFallback::Malformed => write!(f, "malformed"),
            RangeFallback::Unsatisfiable => write!(f, "unsatisfiable"),
        }
    }
}

/// Outcome of resolving a `Range` header against a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeResolution {
    Exact(ByteRange),
    Fallback {
        range: ByteRange,
        reason: RangeFallback,
    },
}

impl RangeResolution {
    /// Window to serve, whichever way it was chosen.
    pub fn range(&self) -> ByteRange {
        match self {
            RangeResolution::Exact(range) => *range,
            RangeResolution::Fallback { range, .. } => *range,
        }
    }
}

/// Resolves a `Range` header value against a file of `file_length` bytes.
///
/// A missing or non-numeric end means end of file, and the end is clamped to
/// the last byte. Returns `None` for an empty file, which has no window to
/// serve.
pub fn parse_range_header(value: &str, file_length: u64) -> Option<RangeResolution> {
    let full = ByteRange::full(file_length)?;
    let last = full.end;

    let Some(start) = requested_start(value) else {
        return Some(RangeResolution::Fallback {
            range: full,
            reason: RangeFallback::Malformed,
        });
    };

    let end = requested_end(value).map_or(last, |end| end.min(last));
    if start > end {
        return Some(RangeResolution::Fallback {
            range: full,
            reason: RangeFallback::Unsatisfiable,
        });
    }

    Some(RangeResolution::Exact(ByteRange { start, end }))
}

fn first_window(value: &str) -> Option<(&str, &str)> {
    let (unit, ranges) = value.trim().split_once('=')?;
    if !unit.trim().eq_ignore_ascii_case("bytes") {
        return None;
    }
    let window = ranges.split(',').next()?;
    window.trim().split_once('-')
}

fn requested_start(value: &str) -> Option<u64> {
    let (start, _) = first_window(value)?;
    let start = start.trim();
    if start.is_empty() || !start.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    start.parse().ok()
}

fn requested_end(value: &str) -> Option<u64> {
    let (_, end) = first_window(value)?;
    let digits: &str = {
        let end = end.trim();
        let count = end.bytes().take_while(u8::is_ascii_digit).count();
        &end[..count]
    };
    if digits.is_empty() {
        return None;
    }
    // Ends too large for u64 still mean "to the end of the file"
    Some(digits.parse().unwrap_or(u64::MAX))
}
