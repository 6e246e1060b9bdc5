//! Streaming gateway rules shared by every HTTP front end.
//!
//! File selection, content type lookup and `Range` header resolution. The
//! web crate turns the results into responses; nothing here performs I/O.

pub mod range;
pub mod selection;

pub use range::{ByteRange, RangeFallback, RangeResolution, parse_range_header};
pub use selection::{VIDEO_EXTENSIONS, mime_type, select_file};
