//! Log output for the server and CLI.
//!
//! The console shows what the operator asked for. The log file under the
//! data directory captures engine and swarm activity at trace level and is
//! replaced on every run.

use std::fmt;
use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use tracing::{Level, Subscriber};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const LOG_FILE_NAME: &str = "streambox-last-run.log";

// Connection-level chatter from the HTTP stack drowns out engine events
const FILE_FILTER: &str = "trace,hyper=info,h2=info,tower=info";

/// Installs the global subscriber and returns the path of the log file.
///
/// `RUST_LOG` overrides `console_level` for the console only.
///
/// # Errors
/// - `Box<dyn std::error::Error>` - Log file could not be created, or a subscriber is already installed
pub fn init_tracing(
    console_level: Level,
    logs_dir: &Path,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    create_dir_all(logs_dir)?;
    let log_file_path = logs_dir.join(LOG_FILE_NAME);
    let log_file = File::create(&log_file_path)?;

    tracing_subscriber::registry()
        .with(console_layer(console_level))
        .with(file_layer(log_file))
        .try_init()?;

    tracing::debug!("Writing trace log to {}", log_file_path.display());
    Ok(log_file_path)
}

fn console_layer<S>(level: Level) -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    tracing_subscriber::fmt::layer()
        .compact()
        .with_filter(filter)
}

fn file_layer<S>(log_file: File) -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(log_file)
        .with_filter(EnvFilter::new(FILE_FILTER))
}

/// Console verbosity accepted by `--log-level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    /// Everything, including per-chunk streaming events
    Trace,
}

impl From<CliLogLevel> for Level {
    /// # Examples
    /// ```
    /// use streambox_core::tracing_setup::CliLogLevel;
    ///
    /// assert_eq!(tracing::Level::from(CliLogLevel::Warn), tracing::Level::WARN);
    /// ```
    fn from(level: CliLogLevel) -> Self {
        match level {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

impl fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Level::from(*self).as_str().to_ascii_lowercase())
    }
}
