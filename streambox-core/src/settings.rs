//! Hot-reloadable engine settings backed by a JSON file.
//!
//! The content engine reads the current settings at every acquisition and
//! every eviction scheduling, so an update takes effect for the next
//! operation without a restart.

use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::StreamboxError;
use crate::swarm::AddOptions;

/// Engine tuning exposed through the settings API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// Download bandwidth limit in bytes per second, -1 for unlimited
    pub download_limit: i64,
    /// Upload bandwidth limit in bytes per second, -1 for unlimited
    pub upload_limit: i64,
    pub max_connections: u32,
    /// Grace period between the last viewer leaving and eviction
    pub cleanup_delay_seconds: u64,
    /// Client hint: seconds to buffer before playback starts
    pub prebuffer_seconds: u64,
    /// Client hint: read-ahead buffer size
    #[serde(rename = "bufferSizeMB")]
    pub buffer_size_mb: u64,
    pub metadata_timeout_seconds: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            download_limit: -1,
            upload_limit: -1,
            max_connections: 55,
            cleanup_delay_seconds: 30,
            prebuffer_seconds: 30,
            buffer_size_mb: 300,
            metadata_timeout_seconds: 60,
        }
    }
}

impl EngineSettings {
    /// Delay between the session set emptying and eviction.
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.cleanup_delay_seconds)
    }

    /// Upper bound on waiting for swarm metadata.
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_seconds)
    }

    /// Per-acquisition limits handed to the swarm engine.
    pub fn add_options(&self) -> AddOptions {
        AddOptions {
            max_connections: self.max_connections as usize,
            download_limit: u64::try_from(self.download_limit).ok(),
            upload_limit: u64::try_from(self.upload_limit).ok(),
        }
    }

    /// Checks every field against its allowed range.
    ///
    /// # Errors
    /// - `StreamboxError::InvalidSetting` - A field is out of range
    pub fn validate(&self) -> Result<(), StreamboxError> {
        check_limit("downloadLimit", self.download_limit)?;
        check_limit("uploadLimit", self.upload_limit)?;
        check("maxConnections", self.max_connections, 1, 200)?;
        check("cleanupDelaySeconds", self.cleanup_delay_seconds, 0, 3600)?;
        check("prebufferSeconds", self.prebuffer_seconds, 0, 120)?;
        check("bufferSizeMB", self.buffer_size_mb, 50, 500)?;
        check("metadataTimeoutSeconds", self.metadata_timeout_seconds, 1, 600)?;
        Ok(())
    }

    fn apply(mut self, update: &SettingsUpdate) -> Self {
        if let Some(value) = update.download_limit {
            self.download_limit = value;
        }
        if let Some(value) = update.upload_limit {
            self.upload_limit = value;
        }
        if let Some(value) = update.max_connections {
            self.max_connections = value;
        }
        if let Some(value) = update.cleanup_delay_seconds {
            self.cleanup_delay_seconds = value;
        }
        if let Some(value) = update.prebuffer_seconds {
            self.prebuffer_seconds = value;
        }
        if let Some(value) = update.buffer_size_mb {
            self.buffer_size_mb = value;
        }
        if let Some(value) = update.metadata_timeout_seconds {
            self.metadata_timeout_seconds = value;
        }
        self
    }
}

fn check<T>(field: &str, value: T, min: T, max: T) -> Result<(), StreamboxError>
where
    T: PartialOrd + std::fmt::Display,
{
    if value < min || value > max {
        return Err(StreamboxError::InvalidSetting {
            reason: format!("{field} must be between {min} and {max}, got {value}"),
        });
    }
    Ok(())
}

fn check_limit(field: &str, value: i64) -> Result<(), StreamboxError> {
    if value < -1 {
        return Err(StreamboxError::InvalidSetting {
            reason: format!("{field} must be -1 (unlimited) or a byte rate, got {value}"),
        });
    }
    Ok(())
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub download_limit: Option<i64>,
    pub upload_limit: Option<i64>,
    pub max_connections: Option<u32>,
    pub cleanup_delay_seconds: Option<u64>,
    pub prebuffer_seconds: Option<u64>,
    #[serde(rename = "bufferSizeMB")]
    pub buffer_size_mb: Option<u64>,
    pub metadata_timeout_seconds: Option<u64>,
}

/// Settings shared between the HTTP layer and the content engine.
///
/// Reads are lock-cheap snapshots; writes validate, persist, then publish.
#[derive(Debug)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    current: RwLock<EngineSettings>,
}

impl SettingsStore {
    /// Loads settings from `path`, creating the file with defaults if needed.
    ///
    /// Keys missing from an existing file are filled with defaults and the
    /// completed document is written back.
    ///
    /// # Errors
    /// - `StreamboxError::SettingsStore` - File unreadable, unwritable or not valid JSON
    /// - `StreamboxError::InvalidSetting` - Stored value out of range
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StreamboxError> {
        let path = path.into();

        let settings = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|e| store_error(&path, e))?;
            let stored: serde_json::Value =
                serde_json::from_str(&raw).map_err(|e| store_error(&path, e))?;
            let settings: EngineSettings =
                serde_json::from_value(stored.clone()).map_err(|e| store_error(&path, e))?;
            settings.validate()?;

            let completed = serde_json::to_value(settings).map_err(|e| store_error(&path, e))?;
            if completed != stored {
                tracing::info!("Filling missing settings in {} with defaults", path.display());
                persist(&path, &settings)?;
            }
            settings
        } else {
            tracing::info!("Creating default settings at {}", path.display());
            let settings = EngineSettings::default();
            persist(&path, &settings)?;
            settings
        };

        Ok(Self {
            path: Some(path),
            current: RwLock::new(settings),
        })
    }

    /// Store that never touches disk.
    pub fn in_memory(settings: EngineSettings) -> Self {
        Self {
            path: None,
            current: RwLock::new(settings),
        }
    }

    /// Snapshot of the current settings.
    pub fn current(&self) -> EngineSettings {
        *self.current.read()
    }

    /// Validates and applies a partial update, persisting the result.
    ///
    /// Nothing changes when validation or persistence fails.
    ///
    /// # Errors
    /// - `StreamboxError::InvalidSetting` - Resulting settings out of range
    /// - `StreamboxError::SettingsStore` - Settings file could not be written
    pub fn update(&self, update: &SettingsUpdate) -> Result<EngineSettings, StreamboxError> {
        let mut current = self.current.write();
        let updated = current.apply(update);
        updated.validate()?;
        self.persist(&updated)?;
        *current = updated;

        tracing::info!(?updated, "Engine settings updated");
        Ok(updated)
    }

    /// Restores and persists the defaults.
    ///
    /// # Errors
    /// - `StreamboxError::SettingsStore` - Settings file could not be written
    pub fn reset(&self) -> Result<EngineSettings, StreamboxError> {
        let mut current = self.current.write();
        let defaults = EngineSettings::default();
        self.persist(&defaults)?;
        *current = defaults;

        tracing::info!("Engine settings reset to defaults");
        Ok(defaults)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn persist(&self, settings: &EngineSettings) -> Result<(), StreamboxError> {
        match &self.path {
            Some(path) => persist(path, settings),
            None => Ok(()),
        }
    }
}

fn persist(path: &Path, settings: &EngineSettings) -> Result<(), StreamboxError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| store_error(path, e))?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(|e| store_error(path, e))?;
    std::fs::write(path, json).map_err(|e| store_error(path, e))
}

fn store_error(path: &Path, error: impl std::fmt::Display) -> StreamboxError {
    StreamboxError::SettingsStore {
        reason: format!("{}: {error}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.grace_period(), Duration::from_secs(30));
        assert_eq!(settings.metadata_timeout(), Duration::from_secs(60));
        assert!(settings.validate().is_ok());

        let options = settings.add_options();
        assert_eq!(options.max_connections, 55);
        assert_eq!(options.download_limit, None);
        assert_eq!(options.upload_limit, None);
    }

    #[test]
    fn test_json_uses_camel_case() {
        let json = serde_json::to_value(EngineSettings::default()).unwrap();
        assert_eq!(json["maxConnections"], 55);
        assert_eq!(json["cleanupDelaySeconds"], 30);
        assert_eq!(json["bufferSizeMB"], 300);
        assert_eq!(json["downloadLimit"], -1);
    }

    #[test]
    fn test_open_creates_file_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let store = SettingsStore::open(&path).unwrap();
        assert_eq!(store.current(), EngineSettings::default());
        assert_eq!(store.path(), Some(path.as_path()));
        assert_eq!(SettingsStore::in_memory(EngineSettings::default()).path(), None);

        let written: EngineSettings =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, EngineSettings::default());
    }

    #[test]
    fn test_open_fills_missing_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"maxConnections": 80}"#).unwrap();

        let store = SettingsStore::open(&path).unwrap();
        assert_eq!(store.current().max_connections, 80);
        assert_eq!(store.current().cleanup_delay_seconds, 30);

        let on_disk: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["maxConnections"], 80);
        assert_eq!(on_disk["prebufferSeconds"], 30);
    }

    #[test]
    fn test_open_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            SettingsStore::open(&path),
            Err(StreamboxError::SettingsStore { .. })
        ));
    }

    #[test]
    fn test_update_persists_and_validates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::open(&path).unwrap();

        let updated = store
            .update(&SettingsUpdate {
                cleanup_delay_seconds: Some(0),
                download_limit: Some(1_000_000),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(updated.cleanup_delay_seconds, 0);
        assert_eq!(updated.add_options().download_limit, Some(1_000_000));

        let reopened = SettingsStore::open(&path).unwrap();
        assert_eq!(reopened.current(), updated);

        let rejected = store.update(&SettingsUpdate {
            max_connections: Some(500),
            cleanup_delay_seconds: Some(10),
            ..Default::default()
        });
        assert!(matches!(rejected, Err(StreamboxError::InvalidSetting { .. })));
        // A rejected update leaves every field untouched
        assert_eq!(store.current(), updated);
    }

    #[test]
    fn test_update_range_limits() {
        let store = SettingsStore::in_memory(EngineSettings::default());
        for update in [
            SettingsUpdate {
                max_connections: Some(0),
                ..Default::default()
            },
            SettingsUpdate {
                cleanup_delay_seconds: Some(3601),
                ..Default::default()
            },
            SettingsUpdate {
                prebuffer_seconds: Some(121),
                ..Default::default()
            },
            SettingsUpdate {
                upload_limit: Some(-2),
                ..Default::default()
            },
            SettingsUpdate {
                metadata_timeout_seconds: Some(0),
                ..Default::default()
            },
        ] {
            assert!(store.update(&update).is_err(), "{update:?} should be rejected");
        }
        assert!(
            store
                .update(&SettingsUpdate {
                    max_connections: Some(200),
                    cleanup_delay_seconds: Some(3600),
                    ..Default::default()
                })
                .is_ok()
        );
    }

    #[test]
    fn test_reset() {
        let store = SettingsStore::in_memory(EngineSettings::default());
        store
            .update(&SettingsUpdate {
                prebuffer_seconds: Some(5),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(store.reset().unwrap(), EngineSettings::default());
        assert_eq!(store.current(), EngineSettings::default());
    }

    #[test]
    fn test_update_parses_camel_case_body() {
        let update: SettingsUpdate =
            serde_json::from_str(r#"{"cleanupDelaySeconds": 5, "unknownKey": true}"#).unwrap();
        assert_eq!(update.cleanup_delay_seconds, Some(5));
        assert_eq!(update.max_connections, None);
    }
}
