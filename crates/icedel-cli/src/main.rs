//! icedel CLI - equality deletes and ad-hoc queries for Iceberg tables.

use anyhow::Result;
use clap::{Parser, Subcommand};
use icedel_core::config::LogFormat;
use icedel_core::{Config, Error};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit codes for CLI operations.
///
/// Following Unix conventions:
/// - 0: Success
/// - 1-127: Application errors
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Successful execution
    Success = 0,
    /// Configuration error (invalid config file, missing required fields)
    ConfigError = 1,
    /// Invalid table, column, operator, or unconfirmed delete
    ValidationError = 2,
    /// Delete would exceed the row limit
    ResourceLimit = 3,
    /// Concurrent writers kept winning until attempts ran out
    ConflictError = 4,
    /// REST catalog error
    CatalogError = 5,
    /// Query engine error
    QueryEngineError = 6,
    /// Storage or file encoding error
    StorageError = 7,
    /// General runtime error
    RuntimeError = 10,
}

impl ExitCode {
    /// Map an error to an exit code by its type.
    fn from_error(error: &anyhow::Error) -> Self {
        match error.downcast_ref::<Error>() {
            Some(Error::Config(_)) => ExitCode::ConfigError,
            Some(Error::Validation(_)) => ExitCode::ValidationError,
            Some(Error::ResourceLimit { .. }) => ExitCode::ResourceLimit,
            Some(Error::Conflict | Error::MaxRetriesExceeded { .. }) => ExitCode::ConflictError,
            Some(Error::Catalog(_)) => ExitCode::CatalogError,
            Some(Error::QueryEngine(_)) => ExitCode::QueryEngineError,
            Some(Error::Storage(_) | Error::Codec(_) | Error::DeleteFile(_)) => {
                ExitCode::StorageError
            }
            Some(Error::Io(_) | Error::Serialization(_)) | None => ExitCode::RuntimeError,
        }
    }
}

mod commands;

#[derive(Parser)]
#[command(name = "icedel")]
#[command(about = "Row-level equality deletes for Iceberg tables", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete rows by id or by filter
    Delete {
        /// Table name
        table: String,

        /// Id to delete (repeatable, wins over --filter)
        #[arg(long = "id")]
        ids: Vec<String>,

        /// Filter as column:op:value (repeatable, AND-ed)
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Confirm the delete
        #[arg(long)]
        yes: bool,
    },

    /// Query rows
    Query {
        /// Table name
        table: String,

        /// Filter as column:op:value (repeatable, AND-ed)
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Column to return (repeatable, default all)
        #[arg(long = "column")]
        columns: Vec<String>,

        /// Maximum rows to return
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() {
    let exit_code = run_cli().await;
    std::process::exit(exit_code as i32);
}

/// Main CLI execution logic with proper error handling.
async fn run_cli() -> ExitCode {
    let cli = Cli::parse();

    // Logging settings come from the config file when it parses
    let monitoring = cli
        .config
        .as_ref()
        .and_then(|path| std::fs::read_to_string(path).ok())
        .and_then(|content| toml::from_str::<Config>(&content).ok())
        .map(|config| config.monitoring)
        .unwrap_or_default();

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match cli.verbose {
            0 => EnvFilter::new(monitoring.log_level.as_str()),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // stdout carries command output
    match monitoring.log_format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
    }

    match execute_command(cli).await {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::from_error(&e)
        }
    }
}

/// Execute the CLI command.
async fn execute_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Delete {
            table,
            ids,
            filters,
            yes,
        } => {
            let config = load_config(&cli.config)?;
            commands::delete::run(config, &table, ids, &filters, yes).await?;
        }

        Commands::Query {
            table,
            filters,
            columns,
            limit,
        } => {
            let config = load_config(&cli.config)?;
            commands::query::run(config, &table, &filters, columns, limit).await?;
        }

        Commands::Validate => {
            load_config(&cli.config)?;
            println!("Configuration is valid");
        }
    }

    Ok(())
}

fn load_config(path: &Option<PathBuf>) -> Result<Config> {
    let path = path.clone().unwrap_or_else(|| PathBuf::from("icedel.toml"));
    Ok(Config::from_file(&path)?)
}
