//! Slipway CLI - run deployments from the terminal
//!
//! The built-in backend is the in-memory one: it exercises the whole
//! pipeline (trust check, digest computation, template parsing, the
//! reconcile state machine) without touching a cloud account, which
//! makes it a config rehearsal tool. Real cloud bindings implement the
//! boundary traits and link the orchestrator as a library.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use output::OutputFormat;

/// Slipway CLI application
#[derive(Parser)]
#[command(name = "slipway")]
#[command(about = "Slipway - deployment orchestrator CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Run a deployment from a config file
    Deploy(commands::DeployArgs),
    /// Request deletion of the configured stack
    Teardown(commands::TeardownArgs),
    /// Print a commented example config
    RenderConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Deploy(args) => commands::deploy(args, cli.output).await,
        Commands::Teardown(args) => commands::teardown(args).await,
        Commands::RenderConfig => {
            print!("{}", commands::EXAMPLE_CONFIG);
            Ok(())
        }
    }
}
