//! Streambox Sim - a swarm engine that serves a local media directory.
//!
//! [`LocalSwarm`] implements the core [`streambox_core::SwarmEngine`] trait
//! without touching the network. Each top-level entry of the library
//! directory is exposed as content with a stable hash derived from its
//! name, metadata arrives after a configurable delay, and downloads are
//! simulated by copying into the cache directory.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use streambox_core::config::SimulationConfig;
//! use streambox_core::{EngineSettings, SettingsStore, spawn_content_engine};
//! use streambox_sim::LocalSwarm;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let swarm = Arc::new(LocalSwarm::new(SimulationConfig::default(), "data/cache"));
//! let catalog = swarm.catalog().await?;
//!
//! let settings = Arc::new(SettingsStore::in_memory(EngineSettings::default()));
//! let engine = spawn_content_engine(swarm, settings);
//! if let Some(entry) = catalog.first() {
//!     let content = engine.acquire(&entry.magnet_uri()).await?;
//!     println!("{} has {} files", content.name(), content.files().len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod library;
pub mod local_swarm;

pub use library::{LibraryEntry, LibraryFile, content_hash, scan_library};
pub use local_swarm::{LocalSwarm, LocalTorrent};
