//! lsql - interactive SQL shell
//!
//! ```bash
//! # Interactive mode
//! lsql interactive data.lsql
//!
//! # One-shot commands
//! lsql import data.lsql speakers speakers.json
//! lsql sql data.lsql "select name, count(*) from speakers group by name" --output json
//! lsql update data.lsql speakers --set "name='John'" --where "id = 1"
//! ```

use std::{path::Path, process::ExitCode};

use clap::Parser;
use lsql::{
    config::Config,
    error::{Error, Result},
    import,
    interrupt::Interrupt,
    shell::{Command, Reply, Session, mutation::StdinConfirm, render::Renderer, repl::Repl, runner},
    sql::{engine::ViewEngine, executor::RowSet},
    storage::DiskEngine,
    store::{KvStore, TableHandle, TableStore},
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod args;

use args::{Cli, Commands};

type Store = KvStore<DiskEngine>;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", Renderer::default().error(&err));
            return ExitCode::FAILURE;
        }
    };

    // LSQL_LOG wins over the config file; --verbose over both
    let filter = if cli.verbose {
        EnvFilter::new("lsql=debug")
    } else {
        EnvFilter::try_from_env("LSQL_LOG").unwrap_or_else(|_| EnvFilter::new(&config.log.level))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if !config.output.color {
        colored::control::set_override(false);
    }
    let renderer = config.output.renderer();

    match run(cli.command, &config, &renderer) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", renderer.error(&err));
            ExitCode::FAILURE
        }
    }
}

fn open_store(db: &Path) -> Result<Store> {
    tracing::debug!(db = %db.display(), "opening database");
    Ok(KvStore::new(DiskEngine::open(db)?))
}

fn start_session(db: &Path) -> Result<Session<Store, ViewEngine>> {
    let interrupt = Interrupt::new();
    interrupt.install_handler()?;
    Session::start(open_store(db)?, ViewEngine::new(interrupt.clone()), interrupt)
}

/// Runs one command through a fresh session and prints the reply
fn one_shot(db: &Path, command: Command, renderer: &Renderer) -> Result<()> {
    let mut session = start_session(db)?;
    let mut confirm = StdinConfirm::new(session.state().interrupt.clone());
    let reply = session.execute(command, &mut confirm)?;
    println!("{}", renderer.reply(&reply));
    Ok(())
}

fn run(command: Commands, config: &Config, renderer: &Renderer) -> Result<()> {
    match command {
        Commands::ListTables { db } => {
            let names = open_store(&db)?.list_tables()?;
            println!("{}", renderer.tables(&format!("Tables in {}", db.display()), &names));
        }

        Commands::Query {
            db,
            table,
            limit,
            predicate,
            select,
            output,
        } => {
            let handle = open_store(&db)?.open_table(&table)?;
            let schema = handle.schema()?;
            let rows = handle.scan(predicate.as_deref(), Some(limit))?;

            // unknown names in --select are skipped
            let picked: Vec<usize> = match select {
                Some(select) => select
                    .split(',')
                    .filter_map(|c| schema.get_col_index(c.trim()).ok())
                    .collect(),
                None => (0..schema.columns.len()).collect(),
            };
            let result = RowSet {
                columns: picked.iter().map(|&i| schema.columns[i].name.clone()).collect(),
                rows: rows
                    .into_iter()
                    .map(|row| picked.iter().map(|&i| row[i].clone()).collect())
                    .collect(),
            };
            let renderer = renderer.clone().with_format(output.unwrap_or(config.output.format));
            println!(
                "{}",
                renderer.rows_titled(&format!("Query results from {}", table), &result)
            );
        }

        Commands::Schema { db, table } => {
            let schema = open_store(&db)?.open_table(&table)?.schema()?;
            println!("{}", renderer.reply(&Reply::Schema(schema)));
        }

        Commands::Sql { db, query, output } => {
            let mut session = start_session(&db)?;
            let outcome = runner::run(session.state_mut(), &query)?;
            let renderer = renderer.clone().with_format(output.unwrap_or(config.output.format));
            println!(
                "{}",
                renderer.rows_titled(
                    &format!("SQL Query Results ({} rows)", outcome.rows.len()),
                    &outcome.rows
                )
            );
        }

        Commands::Delete {
            db,
            table,
            predicate,
        } => one_shot(&db, Command::Delete { table, predicate }, renderer)?,

        Commands::Empty { db, table } => one_shot(&db, Command::Empty(table), renderer)?,

        Commands::Drop { db, table, confirm } => one_shot(
            &db,
            Command::Drop {
                table,
                confirmed: confirm,
            },
            renderer,
        )?,

        Commands::Update {
            db,
            table,
            set_clause,
            predicate,
        } => one_shot(
            &db,
            Command::Update {
                table,
                clause: set_clause,
                predicate,
            },
            renderer,
        )?,

        Commands::Interactive { db } => {
            let session = start_session(&db)?;
            let mut repl = Repl::new(session, renderer.clone(), &config.shell)?;
            repl.run(&db.display().to_string())?;
        }

        Commands::Import { db, table, file } => {
            let json = std::fs::read_to_string(&file).map_err(|e| {
                Error::Internal(format!("failed to read {}: {}", file.display(), e))
            })?;
            let written = import::import_json(&open_store(&db)?, &table, &json)?;
            println!("Imported {} row(s) into '{}'", written, table);
        }
    }
    Ok(())
}
