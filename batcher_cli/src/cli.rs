//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "batcher", version, about = "Concrete batching plant controller")]
pub struct Cli {
    /// Path to plant config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/batcher_config.toml")]
    pub config: PathBuf,

    /// Print results as JSON lines and log as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); defaults to logging.level, then info
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one production order through the automatic sequence
    Run {
        /// Batch order TOML (targets, silos, bins, mixings)
        #[arg(long, value_name = "FILE")]
        batch: PathBuf,
        /// Plant milliseconds per wall-clock millisecond; only useful in simulation
        #[arg(long, value_name = "N", default_value_t = 1)]
        time_scale: u32,
        /// Runner poll period in milliseconds
        #[arg(long, value_name = "MS", default_value_t = 50)]
        tick_ms: u64,
        /// Weigh the next mixing while the current one is in the mixer
        /// (overrides timing.pipeline_next_mixing)
        #[arg(long, action = ArgAction::SetTrue)]
        pipeline: bool,
    },
    /// Replay a recorded weight series as a manual session and print the ledger
    Manual {
        /// CSV with headers timestamp_ms,pasir,batu,semen,air
        #[arg(long, value_name = "FILE")]
        series: PathBuf,
    },
    /// Validate config and relay map; ping the controller when one is configured
    SelfCheck,
}
