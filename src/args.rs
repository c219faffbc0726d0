use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lsql::{config::DEFAULT_CONFIG_PATH, shell::render::OutputFormat};

/// lsql - SQL shell over key/value tables
#[derive(Parser, Debug)]
#[command(name = "lsql")]
#[command(version, about = "Query and edit tables with SQL and dot-commands", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(long = "config", global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List all tables in a database
    ListTables {
        /// Path to the database file
        db: PathBuf,
    },

    /// Read rows from one table
    Query {
        db: PathBuf,
        table: String,
        /// Number of rows to return
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Filter expression (SQL syntax)
        #[arg(long = "where")]
        predicate: Option<String>,
        /// Columns to select (comma-separated)
        #[arg(long)]
        select: Option<String>,
        #[arg(long)]
        output: Option<OutputFormat>,
    },

    /// Show the schema of a table
    Schema { db: PathBuf, table: String },

    /// Run a SQL query across all tables
    Sql {
        db: PathBuf,
        query: String,
        #[arg(long)]
        output: Option<OutputFormat>,
    },

    /// Delete the rows matching a filter
    Delete {
        db: PathBuf,
        table: String,
        #[arg(long = "where")]
        predicate: String,
    },

    /// Delete every row of a table
    Empty { db: PathBuf, table: String },

    /// Drop an entire table
    Drop {
        db: PathBuf,
        table: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        confirm: bool,
    },

    /// Assign values on the rows matching a filter
    Update {
        db: PathBuf,
        table: String,
        /// Assignments, e.g. "name='John', age=41"
        #[arg(long = "set")]
        set_clause: String,
        #[arg(long = "where")]
        predicate: String,
    },

    /// Start the interactive shell
    Interactive { db: PathBuf },

    /// Create a table from a JSON array of objects
    Import {
        db: PathBuf,
        table: String,
        file: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Cli, Commands};

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_update() {
        let cli = Cli::parse_from([
            "lsql", "update", "db.lsql", "speakers", "--set", "name='John'", "--where", "id=1",
        ]);
        match cli.command {
            Commands::Update {
                table,
                set_clause,
                predicate,
                ..
            } => {
                assert_eq!(table, "speakers");
                assert_eq!(set_clause, "name='John'");
                assert_eq!(predicate, "id=1");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!cli.verbose);
    }
}
