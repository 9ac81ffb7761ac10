//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "spider", version, about = "Spider robot CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/spider_config.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full behavior controller until Ctrl-C
    Interact,
    /// Play one built-in animation script and exit
    Play {
        /// Script name (e.g. breathe, knife, wiggle)
        name: String,
    },
    /// Animate to a named pose through its safe route
    Animate {
        /// Target pose name from the pose file
        pose: String,
        /// Transition duration per leg in milliseconds
        #[arg(long, value_name = "MS", default_value_t = 1500)]
        duration_ms: u64,
    },
    /// Send both controllers to their home positions
    Home,
    /// Power off all 24 servos
    Off,
    /// Query one servo's position
    Position {
        /// Logical channel 0-23
        channel: u8,
    },
    /// Report whether any servos are moving
    Moving,
    /// Quick health check (hardware presence / sim ok)
    SelfCheck,
}
