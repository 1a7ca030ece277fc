//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "udccd", version, about = "Differential-lock coil controller")]
pub struct Cli {
    /// Path to config TOML (defaults apply when omitted)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Faults injected into the simulated coil.
#[derive(Args, Debug, Clone, Default)]
pub struct SimFaults {
    /// Override the simulated supply voltage
    #[arg(long, value_name = "MV")]
    pub supply_mv: Option<u16>,
    /// Disconnect the coil
    #[arg(long, action = ArgAction::SetTrue)]
    pub open_load: bool,
    /// Short the coil to this resistance
    #[arg(long, value_name = "MOHM")]
    pub short_mohm: Option<u16>,
    /// Tick at which open-load/short faults are applied
    #[arg(long, value_name = "TICK", default_value_t = 0)]
    pub fault_at: u64,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the control loop against the simulated coil
    Run {
        /// Requested lock force in percent (ignored with --profile)
        #[arg(
            long,
            value_parser = clap::value_parser!(u8).range(0..=100),
            required_unless_present = "profile"
        )]
        force: Option<u8>,
        /// Number of control ticks to run
        #[arg(long, default_value_t = 3000)]
        ticks: u64,
        /// Drive profile CSV (tick,force_pct,supply_mv)
        #[arg(long, value_name = "FILE", conflicts_with = "force")]
        profile: Option<PathBuf>,
        /// Calibration store (read at startup, written after calibration)
        #[arg(long, value_name = "FILE")]
        store: Option<PathBuf>,
        /// Print a status line every N ticks
        #[arg(long, value_name = "N")]
        report_every: Option<u64>,
        /// Pace ticks in wall-clock time instead of simulated time
        #[arg(long, action = ArgAction::SetTrue)]
        realtime: bool,
        #[command(flatten)]
        faults: SimFaults,
    },
    /// Run only the calibration sequence and persist its result
    Calibrate {
        /// Where to store the calibration
        #[arg(long, value_name = "FILE")]
        store: Option<PathBuf>,
        /// Give up after this many ticks
        #[arg(long, default_value_t = 10_000)]
        max_ticks: u64,
        #[command(flatten)]
        faults: SimFaults,
    },
    /// Validate the config and print the effective settings
    SelfCheck,
}
