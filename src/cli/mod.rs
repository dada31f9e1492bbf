//! CLI interface for trailstop
//!
//! Provides subcommands for:
//! - `run`: Trade one coin or a whitelist until Ctrl-C
//! - `check`: Test the exchange connection
//! - `config`: Show the effective configuration

mod check;
mod run;

pub use check::CheckArgs;
pub use run::RunArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "trailstop")]
#[command(about = "Trailing-stop position manager for Bybit spot markets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Trade until interrupted
    Run(RunArgs),
    /// Test the exchange connection
    Check(CheckArgs),
    /// Show configuration
    Config,
}

impl Commands {
    /// Label used to name the per-run log file
    pub fn log_label(&self) -> String {
        match self {
            Commands::Run(args) => args.log_label(),
            Commands::Check(_) => "check".to_string(),
            Commands::Config => "config".to_string(),
        }
    }
}
