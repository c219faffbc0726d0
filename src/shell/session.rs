use crate::{
    error::{Error, Result},
    interrupt::Interrupt,
    shell::{
        SessionState,
        cache::RefreshReport,
        command::{Command, CommandParser},
        mutation::{self, Confirm, DeleteReport, Outcome, UpdateReport},
        runner::{self, QueryOutcome},
    },
    sql::{engine::SqlEngine, schema::Table},
    store::{TableHandle, TableStore},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    Terminated,
}

/// What a handled line produced, ready for rendering
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Nothing,
    Tables(Vec<String>),
    Schema(Table),
    Refreshed(RefreshReport),
    Updated(UpdateReport),
    Deleted(DeleteReport),
    Emptied(DeleteReport),
    Dropped(String),
    Cancelled,
    Rows(QueryOutcome),
    Help,
    Usage(&'static str),
    Goodbye,
}

/// One interactive session over a store and a SQL engine.
///
/// Command failures come back as `Err` and leave the session running; only
/// `.exit` or [`Session::terminate`] end it.
pub struct Session<S: TableStore, G: SqlEngine> {
    state: SessionState<S, G>,
    parser: CommandParser,
    status: Status,
}

impl<S: TableStore, G: SqlEngine> Session<S, G> {
    pub fn start(store: S, engine: G, interrupt: Interrupt) -> Result<Self> {
        let state = SessionState::start(store, engine, interrupt)?;
        tracing::debug!(views = state.views.len(), "session started");
        Ok(Self {
            state,
            parser: CommandParser::new(),
            status: Status::Running,
        })
    }

    pub fn handle_line(&mut self, line: &str, confirm: &mut dyn Confirm) -> Result<Reply> {
        let command = self.parser.parse(line);
        self.execute(command, confirm)
    }

    pub fn execute(&mut self, command: Command, confirm: &mut dyn Confirm) -> Result<Reply> {
        if self.status == Status::Terminated {
            return Err(Error::Internal("session has terminated".into()));
        }
        // a Ctrl-C that arrived while idle must not cancel the next command
        self.state.interrupt.reset();
        tracing::debug!(?command, "dispatch");

        let state = &mut self.state;
        Ok(match command {
            Command::Nothing => Reply::Nothing,
            Command::Help => Reply::Help,
            Command::Usage(usage) => Reply::Usage(usage),
            Command::Exit => {
                self.status = Status::Terminated;
                Reply::Goodbye
            }
            Command::ListTables => Reply::Tables(state.store.list_tables()?),
            Command::Schema(table) => Reply::Schema(state.store.open_table(&table)?.schema()?),
            Command::Refresh => {
                Reply::Refreshed(state.views.refresh_all(&state.store, &mut state.engine)?)
            }
            Command::Update {
                table,
                clause,
                predicate,
            } => Reply::Updated(mutation::update(state, &table, &clause, &predicate)?),
            Command::Delete { table, predicate } => {
                Reply::Deleted(mutation::delete(state, &table, &predicate)?)
            }
            Command::Empty(table) => Reply::Emptied(mutation::empty(state, &table)?),
            Command::Drop { table, confirmed } => {
                match mutation::drop(state, confirm, &table, confirmed)? {
                    Outcome::Done(()) => Reply::Dropped(table),
                    Outcome::Cancelled => Reply::Cancelled,
                }
            }
            Command::RawSql(sql) => Reply::Rows(runner::run(state, &sql)?),
        })
    }

    /// Ends the session, as on end-of-input or Ctrl-C at the prompt
    pub fn terminate(&mut self) {
        self.status = Status::Terminated;
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == Status::Running
    }

    /// Tables with a live view, for completion
    pub fn table_names(&self) -> Vec<String> {
        self.state.views.names()
    }

    pub fn state(&self) -> &SessionState<S, G> {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState<S, G> {
        &mut self.state
    }
}
