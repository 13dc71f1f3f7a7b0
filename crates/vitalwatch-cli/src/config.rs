//! `vitalwatch config` subcommands

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use vitalwatch_monitor::MonitorConfig;

/// Config subcommand
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write the default configuration as JSON
    Init {
        /// Destination file
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Load and validate a configuration file
    Check {
        /// File to check
        path: PathBuf,
    },
}

/// Execute a config subcommand
pub fn execute(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Init { path, force } => {
            if path.exists() && !force {
                anyhow::bail!("{} already exists, pass --force to overwrite", path.display());
            }
            MonitorConfig::default()
                .to_json(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("{} Wrote default configuration to {}", "[OK]".green().bold(), path.display());
        }
        ConfigCommand::Check { path } => {
            let config = MonitorConfig::from_json(&path)
                .with_context(|| format!("checking {}", path.display()))?;
            println!("{} {} is valid", "[OK]".green().bold(), path.display());
            println!(
                "  {} {} ms (adjusted {} ms)",
                "Interval:".dimmed(),
                config.monitoring_interval_ms,
                config.adjusted_interval_ms
            );
            println!("  {} {}", "Max concurrent:".dimmed(), config.max_concurrent_patients);
            println!("  {} {} days", "Retention:".dimmed(), config.retention_days);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_then_check() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vitalwatch.json");

        execute(ConfigCommand::Init { path: path.clone(), force: false }).unwrap();
        execute(ConfigCommand::Check { path: path.clone() }).unwrap();

        // Refuses to clobber without --force
        assert!(execute(ConfigCommand::Init { path: path.clone(), force: false }).is_err());
        execute(ConfigCommand::Init { path, force: true }).unwrap();
    }

    #[test]
    fn test_check_rejects_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"max_concurrent_patients": 0}"#).unwrap();

        assert!(execute(ConfigCommand::Check { path }).is_err());
    }
}
