//! Streambox CLI - Command-line interface
//!
//! Runs the streaming server and inspects the local media library.

mod commands;

use clap::Parser;
use streambox_core::StreamboxConfig;
use streambox_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "streambox")]
#[command(about = "Stream swarm content to the browser while it downloads")]
#[command(version)]
struct Cli {
    /// Console log level (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value_t = CliLogLevel::Info)]
    log_level: CliLogLevel,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logs_dir = StreamboxConfig::from_env().storage.logs_dir();
    init_tracing(cli.log_level.into(), &logs_dir)
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;

    commands::handle_command(cli.command).await
}
