//! CLI module: command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod config;
pub mod gateway;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "aptoclaw")]
#[command(version)]
#[command(about = "Custodial Aptos wallet with a conversational agent, on Telegram", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Telegram bot until Ctrl+C
    Gateway,
    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write a default config file if none exists
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the config file location
    Path,
    /// Check configuration for errors and warnings
    Check,
}

/// Entry point for the CLI, called from main().
pub async fn run() -> Result<()> {
    // Logging settings come from config; fall back to defaults if the file
    // is missing or unreadable.
    let logging_cfg = aptoclaw::config::Config::load()
        .map(|c| c.logging)
        .unwrap_or_default();
    if let Err(e) = aptoclaw::utils::logging::init_logging(&logging_cfg) {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Version) => {
            cmd_version();
        }
        Some(Commands::Gateway) => {
            gateway::cmd_gateway().await?;
        }
        Some(Commands::Config { action }) => {
            config::cmd_config(action).await?;
        }
    }

    Ok(())
}

/// Display version information
fn cmd_version() {
    println!("aptoclaw {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Custodial Aptos wallet with a conversational agent");
}
