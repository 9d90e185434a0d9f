//! CLI module for the inspection line
//!
//! # Commands
//!
//! - `run` - Start the inspection control loop
//! - `network` - Probe the internet uplink, camera and inference server once
//! - `config` - Configuration utilities (init)
//!
//! # Example
//!
//! ```bash
//! # Run against real GPIO with the default config file
//! inspector run
//!
//! # Dry run on simulated hardware
//! inspector run --simulate --log-level debug
//!
//! # Check connectivity as JSON
//! inspector network --json
//! ```

pub mod config;
pub mod network;
pub mod output;
pub mod run;

pub use config::handle_config_init;
pub use network::handle_network;
pub use run::run_inspection;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Inspection line controller
#[derive(Parser, Debug)]
#[command(
    name = "inspector",
    version,
    about = "Sensor-gated camera inspection with AI defect detection and pneumatic ejection"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the inspection control loop
    Run(RunArgs),
    /// Probe network services once and print their status
    Network(NetworkArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "inspector.toml")]
    pub config: PathBuf,

    /// Use the in-memory hardware port instead of GPIO
    #[arg(long)]
    pub simulate: bool,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "INSPECTOR_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Disable periodic network checks
    #[arg(long)]
    pub no_network_check: bool,
}

#[derive(Args, Debug)]
pub struct NetworkArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "inspector.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "inspector.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}
