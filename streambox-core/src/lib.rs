//! Streambox Core - content lifecycle and streaming gateway logic
//!
//! This crate owns everything between an HTTP request and the swarm engine:
//! content identifiers, the swarm adapter boundary, the content engine actor
//! (deduplicated acquisition, viewer sessions, delayed eviction), range and
//! file-selection rules for streaming, configuration, and settings.

pub mod config;
pub mod content;
pub mod engine;
pub mod settings;
pub mod streaming;
pub mod swarm;
pub mod tracing_setup;

use std::time::Duration;

// Re-export main types for convenient access
pub use config::StreamboxConfig;
pub use content::{ContentHandle, FileDescriptor, InfoHash, MagnetLink};
pub use engine::{
    ContentEngineHandle, ContentStatus, ContentSummary, SessionEnd, SessionId, spawn_content_engine,
};
pub use settings::{EngineSettings, SettingsStore, SettingsUpdate};
pub use swarm::{SwarmEngine, SwarmError, SwarmTorrent};

/// Errors surfaced by the content engine and the streaming gateway.
///
/// Cloneable so that a single failed acquisition can be delivered to every
/// caller waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StreamboxError {
    #[error("Invalid content identifier: {input}")]
    InvalidIdentifier { input: String },

    #[error("Metadata for {info_hash} not received within {}s", .timeout.as_secs())]
    MetadataTimeout {
        info_hash: InfoHash,
        timeout: Duration,
    },

    #[error("Swarm error: {0}")]
    Swarm(#[from] SwarmError),

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Invalid setting: {reason}")]
    InvalidSetting { reason: String },

    #[error("Settings store error: {reason}")]
    SettingsStore { reason: String },

    #[error("Content engine has shut down")]
    EngineShutdown,
}

impl StreamboxError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(what: impl Into<String>) -> Self {
        StreamboxError::NotFound { what: what.into() }
    }

    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            StreamboxError::InvalidIdentifier { .. } => {
                "Invalid magnet link or content hash".to_string()
            }
            StreamboxError::MetadataTimeout { timeout, .. } => {
                format!("Could not fetch metadata in {} seconds", timeout.as_secs())
            }
            StreamboxError::Swarm(_) => "Swarm engine error occurred".to_string(),
            StreamboxError::NotFound { what } => format!("{what} not found"),
            StreamboxError::InvalidSetting { reason } => format!("Invalid setting: {reason}"),
            StreamboxError::SettingsStore { .. } => "Settings could not be saved".to_string(),
            StreamboxError::EngineShutdown => "Server is shutting down".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            StreamboxError::InvalidIdentifier { .. } | StreamboxError::InvalidSetting { .. }
        )
    }

    /// Checks if the same request may succeed when retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StreamboxError::MetadataTimeout { .. } | StreamboxError::Swarm(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StreamboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let invalid = StreamboxError::InvalidIdentifier {
            input: "nope".to_string(),
        };
        assert!(invalid.is_user_error());
        assert!(!invalid.is_retryable());

        let timeout = StreamboxError::MetadataTimeout {
            info_hash: InfoHash::new([7u8; 20]),
            timeout: Duration::from_secs(60),
        };
        assert!(timeout.is_retryable());
        assert_eq!(timeout.user_message(), "Could not fetch metadata in 60 seconds");

        let missing = StreamboxError::not_found("Content");
        assert!(!missing.is_retryable());
        assert_eq!(missing.user_message(), "Content not found");
    }
}
