//! Tracepost CLI - Command-line interface for Tracepost
//!
//! Provides commands for:
//! - Inspecting, resending and clearing the pending crash record
//! - Viewing, changing and validating the configuration
//! - Raising a test crash through an installed reporter

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracepost_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{config::ConfigCommand, crash_test::CrashTestCommand, pending::PendingCommand};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "tracepost", version, about = "Crash report capture and delivery")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Inspect and manage the pending crash record
    #[command(subcommand)]
    Pending(PendingCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Install the reporter and raise a test crash
    CrashTest(CrashTestCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);

    // Setup tracing
    let filter = match cli.verbose {
        0 => Config::load_or_default(&config_path).logging.level,
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Pending(cmd) => cmd.execute(format, &config_path).await,
        Commands::Config(cmd) => cmd.execute(format, &config_path).await,
        Commands::CrashTest(cmd) => cmd.execute(format, &config_path).await,
    }
}
