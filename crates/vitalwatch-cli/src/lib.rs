//! VitalWatch CLI
//!
//! Command-line runner for the patient monitoring supervisor. It drives a
//! simulated device fleet, which is useful for demos and soak tests.
//!
//! # Usage
//!
//! ```bash
//! # Monitor eight simulated patients for a minute
//! vitalwatch run --patients 8 --duration-secs 60
//!
//! # Write the default configuration, edit it, then check it
//! vitalwatch config init vitalwatch.json
//! vitalwatch config check vitalwatch.json
//! ```

use clap::{Parser, Subcommand};

pub mod config;
pub mod run;

/// VitalWatch Command Line Interface
#[derive(Parser, Debug)]
#[command(name = "vitalwatch")]
#[command(author, version, about = "Continuous patient vital-sign monitoring")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Monitor a simulated patient fleet
    Run(run::RunArgs),

    /// Create or validate configuration files
    #[command(subcommand)]
    Config(config::ConfigCommand),

    /// Display version information
    Version,
}
