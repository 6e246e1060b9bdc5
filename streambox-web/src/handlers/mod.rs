//! HTTP request handlers organized by functionality

pub mod api;
pub mod session;
pub mod settings;
pub mod streaming;
pub mod utils;

// Re-export handler functions
pub use api::{health, list_torrents, status, torrent_files};
pub use session::{end_session, post_session};
pub use settings::{get_settings, reset_settings, update_settings};
pub use streaming::stream_content;
