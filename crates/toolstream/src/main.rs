mod commands;

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use toolstream::orchestrator::ExecutionMode;

// ============================================================================
// CLI Types
// ============================================================================

/// Toolstream - run batches of tools and stream their progress
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = "toolstream.yaml")]
        config: String,

        /// Host to bind to (overrides config file)
        #[arg(long)]
        host: Option<IpAddr>,

        /// Port to listen on (overrides config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one batch from a request file and print its events as JSON lines
    Run {
        /// Request file with the same shape as the execute endpoint body
        #[arg(value_name = "REQUEST")]
        request: PathBuf,

        /// Path to configuration file
        #[arg(short, long, default_value = "toolstream.yaml")]
        config: String,

        /// Execution mode (overrides request and config file)
        #[arg(short, long, value_parser = parse_mode)]
        mode: Option<ExecutionMode>,
    },
}

fn parse_mode(value: &str) -> Result<ExecutionMode, String> {
    match value {
        "sequential" => Ok(ExecutionMode::Sequential),
        "parallel" => Ok(ExecutionMode::Parallel),
        other => Err(format!(
            "unknown mode '{other}' (expected 'sequential' or 'parallel')"
        )),
    }
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, host, port } => commands::serve::run(&config, host, port).await,
        Commands::Run {
            request,
            config,
            mode,
        } => commands::run::run(&request, &config, mode).await,
    }
}

// ============================================================================
// Initialization
// ============================================================================

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
