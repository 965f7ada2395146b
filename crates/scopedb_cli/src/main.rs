//! ScopeDB CLI
//!
//! Command-line tools for ScopeDB databases.
//!
//! # Commands
//!
//! - `exec` - Run a statement script in one root cursor
//! - `dump-journal` - Dump journal records for debugging
//! - `verify` - Verify journal integrity
//! - `inspect` - Display tables and journal statistics
//! - `compact` - Rewrite the journal as a single checkpoint

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// ScopeDB command-line database tools.
#[derive(Parser)]
#[command(name = "scopedb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the statements of a script in one root cursor
    Exec {
        /// Script file, one statement per line
        script: PathBuf,

        /// Roll back instead of committing
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Dump journal records for debugging
    DumpJournal {
        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify journal integrity
    Verify,

    /// Display tables and journal statistics
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Rewrite the journal as a single checkpoint transaction
    Compact,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Exec { script, dry_run } => {
            let path = cli.path.ok_or("Database path required for exec")?;
            commands::exec::run(&path, &script, dry_run)?;
        }
        Commands::DumpJournal { limit, format } => {
            let path = cli.path.ok_or("Database path required for dump-journal")?;
            commands::dump_journal::run(&path, limit, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Database path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Database path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Compact => {
            let path = cli.path.ok_or("Database path required for compact")?;
            commands::compact::run(&path)?;
        }
        Commands::Version => {
            println!("ScopeDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("ScopeDB Core v{}", scopedb_core::VERSION);
        }
    }

    Ok(())
}
