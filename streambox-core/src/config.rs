//! Centralized process configuration for Streambox.
//!
//! Values here are fixed for the lifetime of the process. Runtime-tunable
//! engine behavior (grace period, timeouts, limits) lives in
//! [`crate::settings`] instead.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Central configuration for all Streambox components.
///
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct StreamboxConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub simulation: SimulationConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP API listens on
    pub bind_address: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

/// On-disk locations.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root for persisted state such as the settings file
    pub data_dir: PathBuf,
    /// Where the swarm engine keeps downloaded content
    pub cache_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            cache_dir: PathBuf::from("data").join("cache"),
        }
    }
}

impl StorageConfig {
    /// Path of the JSON settings file.
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    /// Directory holding the last run's log file.
    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

/// Local swarm simulation used for development and demos.
///
/// Controls how the directory-backed swarm engine pretends to be a network.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Directory whose top-level entries are served as swarm content
    pub library_dir: PathBuf,
    /// Simulated time until metadata arrives
    pub metadata_delay: Duration,
    /// Lower bound of the reported peer count
    pub min_peers: usize,
    /// Upper bound of the reported peer count
    pub max_peers: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            library_dir: PathBuf::from("library"),
            metadata_delay: Duration::from_millis(500),
            min_peers: 5,
            max_peers: 40,
        }
    }
}

impl SimulationConfig {
    /// Creates a configuration for fast deterministic tests.
    pub fn instant() -> Self {
        Self {
            metadata_delay: Duration::ZERO,
            min_peers: 10,
            max_peers: 10,
            ..Default::default()
        }
    }
}

impl StreamboxConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(bind) = std::env::var("STREAMBOX_BIND")
            && let Ok(address) = bind.parse::<SocketAddr>()
        {
            config.server.bind_address = address;
        }

        if let Ok(data_dir) = std::env::var("STREAMBOX_DATA_DIR") {
            config.storage.cache_dir = PathBuf::from(&data_dir).join("cache");
            config.storage.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(cache_dir) = std::env::var("STREAMBOX_CACHE_DIR") {
            config.storage.cache_dir = PathBuf::from(cache_dir);
        }

        if let Ok(library_dir) = std::env::var("STREAMBOX_LIBRARY_DIR") {
            config.simulation.library_dir = PathBuf::from(library_dir);
        }

        if let Ok(delay) = std::env::var("STREAMBOX_METADATA_DELAY_MS")
            && let Ok(millis) = delay.parse::<u64>()
        {
            config.simulation.metadata_delay = Duration::from_millis(millis);
        }

        config
    }

    /// Creates a configuration optimized for testing.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig {
                bind_address: SocketAddr::from(([127, 0, 0, 1], 0)),
            },
            simulation: SimulationConfig::instant(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = StreamboxConfig::default();

        assert_eq!(config.server.bind_address.to_string(), "127.0.0.1:3000");
        assert_eq!(config.storage.data_dir, PathBuf::from("data"));
        assert_eq!(config.storage.cache_dir, PathBuf::from("data/cache"));
        assert_eq!(
            config.storage.settings_path(),
            PathBuf::from("data/settings.json")
        );
        assert_eq!(config.storage.logs_dir(), PathBuf::from("data/logs"));
        assert!(config.simulation.min_peers <= config.simulation.max_peers);
    }

    #[test]
    fn test_testing_preset() {
        let config = StreamboxConfig::for_testing();
        assert_eq!(config.server.bind_address.port(), 0);
        assert_eq!(config.simulation.metadata_delay, Duration::ZERO);
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("STREAMBOX_BIND", "0.0.0.0:8080");
            std::env::set_var("STREAMBOX_DATA_DIR", "/tmp/streambox");
            std::env::set_var("STREAMBOX_LIBRARY_DIR", "/srv/media");
            std::env::set_var("STREAMBOX_METADATA_DELAY_MS", "25");
        }

        let config = StreamboxConfig::from_env();

        assert_eq!(config.server.bind_address.port(), 8080);
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/streambox"));
        assert_eq!(config.storage.cache_dir, PathBuf::from("/tmp/streambox/cache"));
        assert_eq!(config.simulation.library_dir, PathBuf::from("/srv/media"));
        assert_eq!(config.simulation.metadata_delay, Duration::from_millis(25));

        // Cleanup
        unsafe {
            std::env::remove_var("STREAMBOX_BIND");
            std::env::remove_var("STREAMBOX_DATA_DIR");
            std::env::remove_var("STREAMBOX_LIBRARY_DIR");
            std::env::remove_var("STREAMBOX_METADATA_DELAY_MS");
        }
    }
}
