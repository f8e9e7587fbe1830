//! Operator CLI for Warden
//!
//! Validates configuration and inspects the persisted anchor records a
//! running coordinator relies on.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::{anchors, check_config, AnchorsCommand};

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Warden - guild automation coordinator tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (`.toml` or JSON)
    #[arg(short, long, global = true, default_value = "config.json")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Load, merge environment overrides and validate the configuration
    CheckConfig,

    /// Inspect or reset persisted anchor records
    #[command(subcommand)]
    Anchors(AnchorsCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let config = commands::load_config(&cli.config)?;
    let report = match cli.command {
        Commands::CheckConfig => check_config::run(&config)?,
        Commands::Anchors(cmd) => anchors::run(cmd, &config).await?,
    };
    println!("{report}");

    Ok(())
}
