//! Binary entry point for knowstore.
//!
//! A thin command-line front end over the store contract. Every command
//! prints JSON on stdout; errors go to stderr with a non-zero exit code.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use knowstore::commands::{self, EntryArgs, SearchArgs};
use knowstore::config::{BackendKind, KnowstoreConfig};
use knowstore::storage::{KnowledgeStore, create_store};
use knowstore::{Error, observability};
use std::path::PathBuf;
use std::process::ExitCode;

/// Knowstore - a knowledge record store with a boolean filter DSL.
#[derive(Parser)]
#[command(name = "knowstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging for knowstore.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Storage backend: memory, file or postgres.
    #[arg(short, long, global = true)]
    backend: Option<String>,

    /// Path of the JSON document (file backend).
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Add a record.
    Add(EntryArgs),

    /// Print an active record.
    Get {
        /// Record ID.
        id: String,
    },

    /// Replace an active record.
    Update(EntryArgs),

    /// Soft-delete a record.
    Delete {
        /// Record ID.
        id: String,
    },

    /// Restore a soft-deleted record.
    Restore {
        /// Record ID.
        id: String,
    },

    /// Permanently remove a record.
    Purge {
        /// Record ID.
        id: String,
    },

    /// Search records.
    Search(SearchArgs),

    /// Bulk-load records from a JSON array.
    Load {
        /// File to read, or `-` for stdin.
        path: PathBuf,
    },

    /// Show backend details.
    Info,
}

impl Commands {
    const fn mutates(&self) -> bool {
        matches!(
            self,
            Self::Add(_)
                | Self::Update(_)
                | Self::Delete { .. }
                | Self::Restore { .. }
                | Self::Purge { .. }
                | Self::Load { .. }
        )
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, &config) {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            },
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            },
        },
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Loads configuration, then applies command-line overrides.
fn load_config(cli: &Cli) -> knowstore::Result<KnowstoreConfig> {
    let mut config = KnowstoreConfig::load(cli.config.as_deref())?;
    if let Some(backend) = &cli.backend {
        config.backend = BackendKind::parse(backend)
            .ok_or_else(|| Error::InvalidInput(format!("unknown backend '{backend}'")))?;
    }
    if let Some(path) = &cli.file {
        config.file.path.clone_from(path);
        if cli.backend.is_none() {
            config.backend = BackendKind::File;
        }
    }
    if cli.verbose {
        config.logging.level = "knowstore=debug,warn".to_string();
    }
    Ok(config)
}

/// Runs the selected command against a freshly opened store.
fn run_command(command: Commands, config: &KnowstoreConfig) -> knowstore::Result<serde_json::Value> {
    let store = create_store(config)?;
    let mutates = command.mutates();

    let output = dispatch(command, store.as_ref());

    if mutates && output.is_ok() {
        store.flush()?;
    }
    let closed = store.close();
    let output = output?;
    closed?;
    Ok(output)
}

fn dispatch(command: Commands, store: &dyn KnowledgeStore) -> knowstore::Result<serde_json::Value> {
    match command {
        Commands::Add(args) => commands::cmd_add(store, args.to_entry()?),
        Commands::Get { id } => commands::cmd_get(store, &id),
        Commands::Update(args) => {
            if args.id.is_none() {
                return Err(Error::InvalidInput("update requires a record ID".to_string()));
            }
            commands::cmd_update(store, args.to_entry()?)
        },
        Commands::Delete { id } => commands::cmd_delete(store, &id),
        Commands::Restore { id } => commands::cmd_restore(store, &id),
        Commands::Purge { id } => commands::cmd_purge(store, &id),
        Commands::Search(args) => commands::cmd_search(store, &args.to_filter()?),
        Commands::Load { path } => commands::cmd_load(store, &path),
        Commands::Info => commands::cmd_info(store),
    }
}
