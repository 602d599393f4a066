//! Command-line interface for the relay monitor
//!
//! # Usage
//!
//! ```bash
//! # Watch the remote viewer worker
//! relay-monitor --profile remote-controller --show-console
//!
//! # Host an application
//! relay-monitor --profile application-host --app /opt/game/run
//!
//! # Custom worker binary and verbose logs
//! relay-monitor --worker ./target/debug/viewer --log-level debug
//! ```

use std::path::PathBuf;

use clap::Parser;

use crate::profile::Profile;

/// Relay Monitor - supervise a worker over a shared memory channel
///
/// Launches the worker with `-MEM=<token>`, polls its status every 250 ms
/// and forwards commands typed on stdin.
#[derive(Parser, Debug, Clone)]
#[command(name = "relay-monitor")]
#[command(version)]
#[command(about = "Supervise a worker process over a shared memory channel", long_about = None)]
pub struct Args {
    /// Supervisor profile
    ///
    /// Fixes the channel layout, host label format and default worker.
    #[arg(short, long, value_enum, value_name = "PROFILE")]
    pub profile: Option<Profile>,

    /// Worker executable
    #[arg(short, long, value_name = "PATH")]
    pub worker: Option<PathBuf>,

    /// Application passed to the worker as `-APP="<path>"`
    #[arg(long, value_name = "PATH")]
    pub app: Option<PathBuf>,

    /// Keep the worker's console output visible
    #[arg(long)]
    pub show_console: bool,

    /// Config file (TOML)
    ///
    /// Defaults to `<config dir>/relay-monitor/config.toml` when present.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// How long a tick waits for the channel lock
    #[arg(long, value_name = "MS")]
    pub lock_timeout_ms: Option<u64>,

    /// Log level for output
    ///
    /// Controls the verbosity of log output. Available levels:
    /// error, warn, info, debug, trace
    #[arg(long, default_value = "info", value_name = "LEVEL")]
    pub log_level: String,

    /// Create the channel but wait for a `launch` command
    #[arg(long)]
    pub no_launch: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            profile: None,
            worker: None,
            app: None,
            show_console: false,
            config: None,
            lock_timeout_ms: None,
            log_level: "info".to_string(),
            no_launch: false,
        }
    }
}

impl Args {
    /// Get log level as env_logger filter string
    pub fn log_filter(&self) -> &str {
        match self.log_level.to_lowercase().as_str() {
            "error" => "error",
            "warn" | "warning" => "warn",
            "info" => "info",
            "debug" => "debug",
            "trace" => "trace",
            _ => "info",
        }
    }
}
