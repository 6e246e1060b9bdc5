//! CLI command implementations

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Subcommand;
use streambox_core::content::format_size;
use streambox_core::{EngineSettings, SettingsStore, StreamboxConfig, spawn_content_engine};
use streambox_sim::LocalSwarm;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the streaming server over the local library
    Server {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
        /// Directory served as swarm content
        #[arg(long)]
        library: Option<PathBuf>,
        /// Directory for settings and cached content
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// List the files of a piece of content, marking the main video
    Files {
        /// Magnet URI or info hash
        uri: String,
        /// Directory served as swarm content
        #[arg(long)]
        library: Option<PathBuf>,
    },
    /// Print a magnet URI for every entry of the library
    Catalog {
        /// Directory served as swarm content
        #[arg(long)]
        library: Option<PathBuf>,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns the error of the command that failed
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Server {
            host,
            port,
            library,
            data_dir,
        } => start_server(host, port, library, data_dir).await,
        Commands::Files { uri, library } => list_files(uri, library).await,
        Commands::Catalog { library } => print_catalog(library).await,
    }
}

fn load_config(library: Option<PathBuf>) -> StreamboxConfig {
    let mut config = StreamboxConfig::from_env();
    if let Some(library) = library {
        config.simulation.library_dir = library;
    }
    config
}

/// Start the streaming server
///
/// # Errors
/// - Invalid bind address
/// - Settings file unreadable or server failed to bind
pub async fn start_server(
    host: String,
    port: u16,
    library: Option<PathBuf>,
    data_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = load_config(library);
    config.server.bind_address = format!("{host}:{port}")
        .parse::<SocketAddr>()
        .with_context(|| format!("Invalid bind address {host}:{port}"))?;
    if let Some(data_dir) = data_dir {
        config.storage.cache_dir = data_dir.join("cache");
        config.storage.data_dir = data_dir;
    }

    tracing::info!(
        "Serving library {} (cache: {})",
        config.simulation.library_dir.display(),
        config.storage.cache_dir.display()
    );

    let swarm = Arc::new(LocalSwarm::new(
        config.simulation.clone(),
        config.storage.cache_dir.clone(),
    ));
    streambox_web::run_server(config, swarm)
        .await
        .map_err(|e| anyhow::anyhow!("Server failed: {e}"))
}

/// List files of one piece of content
///
/// # Errors
/// - Identifier is invalid, or the content is not in the library
pub async fn list_files(uri: String, library: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(library);
    let swarm = Arc::new(LocalSwarm::new(
        config.simulation.clone(),
        config.storage.cache_dir.clone(),
    ));
    let settings = EngineSettings {
        metadata_timeout_seconds: 10,
        ..EngineSettings::default()
    };
    let engine = spawn_content_engine(swarm, Arc::new(SettingsStore::in_memory(settings)));

    let result = engine.acquire(&uri).await;
    let content = match result {
        Ok(content) => content,
        Err(e) => {
            let _ = engine.shutdown().await;
            return Err(e).with_context(|| format!("Could not load {uri}"));
        }
    };

    println!("{} ({})", content.name(), content.info_hash());
    let main_video = content.main_video_index();
    for file in content.files() {
        let marker = if Some(file.index) == main_video { "*" } else { " " };
        println!(
            "{marker} [{}] {} ({})",
            file.index,
            file.path,
            format_size(file.length)
        );
    }

    engine.shutdown().await?;
    Ok(())
}

/// Print every library entry with its magnet URI
///
/// # Errors
/// - Library directory is unreadable
pub async fn print_catalog(library: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(library);
    let swarm = LocalSwarm::new(config.simulation.clone(), config.storage.cache_dir.clone());

    let entries = swarm
        .catalog()
        .await
        .with_context(|| format!("Cannot read library {}", swarm.library_dir().display()))?;

    if entries.is_empty() {
        println!("Library {} is empty", swarm.library_dir().display());
        return Ok(());
    }

    for entry in entries {
        println!(
            "{} ({} files, {})",
            entry.name,
            entry.files.len(),
            format_size(entry.total_size())
        );
        println!("  {}", entry.magnet_uri());
    }
    Ok(())
}
