//! Relay Monitor - Main entry point
//!
//! Parses command-line arguments, resolves the configuration layers and runs
//! the monitor loop on a current-thread runtime.
//!
//! # Usage
//!
//! ```bash
//! relay-monitor --help                       # Show help
//! relay-monitor --profile throughput         # Plot transfer throughput
//! relay-monitor --log-level debug            # Enable debug logging
//! ```

mod actions;
mod app;
mod cli;
mod config;
mod profile;
mod render;

pub use cli::Args;

use clap::Parser;

use crate::config::MonitorConfig;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Configure logging based on CLI args
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(args.log_filter()),
    )
    .init();

    log::info!("Starting Relay Monitor");
    log::debug!("CLI args: {:?}", args);

    let config = MonitorConfig::load(&args)?;
    log::debug!("Resolved config: {:?}", config);

    if config.show_console {
        log::info!("Worker console enabled");
    }
    if let Some(ref app) = config.app {
        log::info!("Hosting application: {}", app.display());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(app::run(config))
}
