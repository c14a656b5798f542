//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "shot", version, about = "Espresso shot dosing controller")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/shot_config.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Override control.tick_ms from the config
    #[arg(long = "tick-ms", value_name = "MS")]
    pub tick_ms: Option<u64>,

    /// Use the simulated relay even when built with hardware support
    #[arg(long, action = ArgAction::SetTrue)]
    pub simulate: bool,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the controller until Ctrl-C (or `quit` on stdin)
    Run {
        /// Stop after this many ticks
        #[arg(long, value_name = "N")]
        ticks: Option<u64>,
        /// Directory for frames saved after a calibrated shot (overrides display.save_dir)
        #[arg(long = "save-dir", value_name = "DIR")]
        save_dir: Option<PathBuf>,
        /// Ignore stdin; operator input then comes only from the panel
        #[arg(long = "no-stdin", action = ArgAction::SetTrue)]
        no_stdin: bool,
        /// Clear the terminal before each frame
        #[arg(long, action = ArgAction::SetTrue)]
        ansi: bool,
    },
    /// Connect to the scale once, read it, and disconnect
    SelfCheck,
}
