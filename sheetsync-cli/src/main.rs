//! sheetsync — spreadsheet to store reconciliation CLI.
//!
//! # Usage
//!
//! ```text
//! sheetsync init <job> [--spreadsheet-id <id>] [--range <a1>] [--force]
//! sheetsync run <job> [--dry-run]
//! sheetsync diff <job> [--unified]
//! sheetsync status [<job>] [--json]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{diff::DiffArgs, init::InitArgs, run::RunArgs, status::StatusArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "sheetsync",
    version,
    about = "Reconcile spreadsheet datasets into downstream stores",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a starter job configuration.
    Init(InitArgs),

    /// Fetch the source, reconcile against the baseline and apply changes.
    Run(RunArgs),

    /// Show the change-set a run would apply, without writing.
    Diff(DiffArgs),

    /// Show snapshot freshness across configured jobs.
    Status(StatusArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Run(args) => runtime.block_on(args.run()),
        Commands::Diff(args) => runtime.block_on(args.run()),
        Commands::Status(args) => args.run(),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
