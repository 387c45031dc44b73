//! Tabula CLI
//!
//! Browse and edit the rows of any table over PostgreSQL or SQLite.
//!
//! # Commands
//!
//! - `tables`, `columns`, `show`, `count`, `keys` - inspect
//! - `insert`, `update`, `delete`, `edit`, `add-row` - change rows
//! - `export`, `import` - move a table as JSON
//! - `test-connection` - check the connection string

mod commands;
mod logging;
mod output;
mod settings;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::settings::Settings;

/// Generic table editor for PostgreSQL and SQLite.
#[derive(Parser)]
#[command(name = "tabula")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Connection string; falls back to DB_CONNECTION_STRING, then the settings file
    #[arg(global = true, short, long)]
    connection: Option<String>,

    /// Settings file (default: <config dir>/tabula/settings.toml)
    #[arg(global = true, long)]
    config: Option<PathBuf>,

    /// Also write JSON logs under the log directory
    #[arg(global = true, long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

/// `column=value`; `NULL` is SQL NULL
pub(crate) type Assignment = (String, String);

fn parse_assignment(input: &str) -> Result<Assignment, String> {
    match input.split_once('=') {
        Some((column, value)) if !column.trim().is_empty() => {
            Ok((column.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected column=value, got {input:?}")),
    }
}

#[derive(Subcommand)]
enum Command {
    /// List tables with their row counts
    Tables,

    /// Describe the columns of a table
    Columns { table: String },

    /// Print the rows of a table (up to the row cap)
    Show { table: String },

    /// Count the rows of a table
    Count { table: String },

    /// Show which columns identify a row
    Keys { table: String },

    /// Insert one row
    Insert {
        table: String,
        #[arg(long = "set", value_parser = parse_assignment, required = true)]
        set: Vec<Assignment>,
    },

    /// Update rows matched by key, or by every original value
    Update {
        table: String,
        #[arg(long = "set", value_parser = parse_assignment, required = true)]
        set: Vec<Assignment>,
        /// Key columns identifying the row
        #[arg(long = "key", value_parser = parse_assignment, conflicts_with = "matching", required_unless_present = "matching")]
        key: Vec<Assignment>,
        /// Original values of every column, for tables without a key
        #[arg(long = "match", value_parser = parse_assignment)]
        matching: Vec<Assignment>,
    },

    /// Delete rows by key
    Delete {
        table: String,
        #[arg(long = "key", value_parser = parse_assignment, required = true)]
        key: Vec<Assignment>,
    },

    /// Edit a displayed row (see the `#` column of `show`) in one session
    Edit {
        table: String,
        #[arg(long)]
        row: u64,
        #[arg(long = "set", value_parser = parse_assignment, required = true)]
        set: Vec<Assignment>,
        /// Do not ask before editing a table without a key
        #[arg(short, long)]
        yes: bool,
    },

    /// Insert a row with placeholder values for required columns
    AddRow { table: String },

    /// Write a table as a JSON array of objects
    Export {
        table: String,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Insert every object of a JSON file in one transaction
    Import { table: String, file: PathBuf },

    /// Connect, run SELECT 1 and describe the server
    TestConnection,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    let _log_guard = logging::init(&logging::LoggingConfig::for_run(
        &settings.logging,
        cli.json_logs,
    ))?;

    let engine = commands::Engine::connect(&settings, cli.connection.as_deref())?;

    match cli.command {
        Command::Tables => engine.tables().await,
        Command::Columns { table } => engine.columns(&table).await,
        Command::Show { table } => engine.show(&table).await,
        Command::Count { table } => engine.count(&table).await,
        Command::Keys { table } => engine.keys(&table).await,
        Command::Insert { table, set } => engine.insert(&table, &set).await,
        Command::Update {
            table,
            set,
            key,
            matching,
        } => engine.update(&table, &set, &key, &matching).await,
        Command::Delete { table, key } => engine.delete(&table, &key).await,
        Command::Edit {
            table,
            row,
            set,
            yes,
        } => engine.edit(&table, row, &set, yes).await,
        Command::AddRow { table } => engine.add_row(&table).await,
        Command::Export { table, output } => engine.export(&table, output.as_deref()).await,
        Command::Import { table, file } => engine.import(&table, &file).await,
        Command::TestConnection => engine.test_connection().await,
    }
}
