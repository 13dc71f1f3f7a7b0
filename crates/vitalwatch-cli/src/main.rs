//! VitalWatch CLI Entry Point

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vitalwatch_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            vitalwatch_cli::run::execute(args).await?;
        }
        Commands::Config(cmd) => {
            vitalwatch_cli::config::execute(cmd)?;
        }
        Commands::Version => {
            println!("vitalwatch {}", env!("CARGO_PKG_VERSION"));
            println!("Monitor library version: {}", vitalwatch_monitor::VERSION);
        }
    }

    Ok(())
}
