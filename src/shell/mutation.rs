//! Dot-command mutations: each verb checks the table exists, acts on the
//! store, then resynchronizes that table's view.

use std::{
    io::{self, BufRead, Write},
    sync::mpsc::{self, Receiver, RecvTimeoutError},
    thread,
    time::Duration,
};

use crate::{
    error::{Error, Result},
    interrupt::Interrupt,
    shell::{SessionState, clause},
    sql::engine::SqlEngine,
    store::{TableHandle, TableStore},
};

/// How often a pending confirmation checks for Ctrl-C
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result of a command the user may decline
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Done(T),
    Cancelled,
}

/// Asks the user to approve a destructive action
pub trait Confirm {
    /// Shows `warning`, asks `question`, and returns the raw answer
    fn ask(&mut self, warning: &str, question: &str) -> Result<String>;
}

/// Reads the answer from standard input.
///
/// The read happens on its own thread so a Ctrl-C raised while waiting ends
/// the prompt with `Error::Interrupted`. End of input reads as an empty answer.
pub struct StdinConfirm {
    interrupt: Interrupt,
}

impl StdinConfirm {
    pub fn new(interrupt: Interrupt) -> Self {
        Self { interrupt }
    }
}

impl Confirm for StdinConfirm {
    fn ask(&mut self, warning: &str, question: &str) -> Result<String> {
        use colored::Colorize;

        println!("{}", warning.yellow());
        print!("{}", question);
        io::stdout().flush()?;

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut answer = String::new();
            let read = io::stdin().lock().read_line(&mut answer).map(|_| answer);
            // the prompt may already have been interrupted
            let _ = tx.send(read);
        });
        await_answer(&rx, &self.interrupt)
    }
}

fn await_answer(rx: &Receiver<io::Result<String>>, interrupt: &Interrupt) -> Result<String> {
    loop {
        interrupt.checkpoint()?;
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(read) => return Ok(read?),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return Ok(String::new()),
        }
    }
}

pub const DROP_QUESTION: &str = "Are you sure? (yes/no): ";

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateReport {
    pub table: String,
    pub columns: Vec<String>,
    pub predicate: String,
    pub updated: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteReport {
    pub table: String,
    pub predicate: String,
    pub rows_before: usize,
    pub rows_after: usize,
    /// Affected row count as reported by the store
    pub deleted: usize,
}

fn ensure_table<S: TableStore>(store: &S, table: &str) -> Result<()> {
    if store.list_tables()?.iter().any(|t| t == table) {
        Ok(())
    } else {
        Err(Error::TableNotFound(table.to_string()))
    }
}

/// Re-materializes the table's view after a successful mutation. A failure
/// here leaves the view evicted; the mutation itself has already happened.
fn resync<S: TableStore, G: SqlEngine>(state: &mut SessionState<S, G>, table: &str) {
    let SessionState {
        store,
        engine,
        views,
        ..
    } = state;
    if let Err(err) = views.refresh_one(store, engine, table) {
        tracing::warn!(table, error = %err, "could not refresh view after mutation");
    }
}

pub fn update<S: TableStore, G: SqlEngine>(
    state: &mut SessionState<S, G>,
    table: &str,
    set_clause: &str,
    predicate: &str,
) -> Result<UpdateReport> {
    ensure_table(&state.store, table)?;
    let assignments = clause::parse_assignments(set_clause)?;
    if assignments.is_empty() {
        return Err(Error::MalformedClause(
            "Invalid SET clause format. Use key=value pairs separated by commas".into(),
        ));
    }
    let columns: Vec<String> = assignments.keys().cloned().collect();
    let predicate = clause::strip_where(predicate);
    let failed = |err| Error::store_failure("update", table, columns.clone(), predicate, err);

    state.interrupt.checkpoint()?;
    let updated = state
        .store
        .open_table(table)
        .and_then(|handle| handle.update(predicate, &assignments))
        .map_err(failed)?;
    tracing::debug!(table, ?columns, predicate, updated, "update applied");
    resync(state, table);

    Ok(UpdateReport {
        table: table.to_string(),
        columns,
        predicate: predicate.to_string(),
        updated,
    })
}

pub fn delete<S: TableStore, G: SqlEngine>(
    state: &mut SessionState<S, G>,
    table: &str,
    predicate: &str,
) -> Result<DeleteReport> {
    let predicate = clause::strip_where(predicate);
    let failed = |err| Error::store_failure("delete", table, Vec::new(), predicate, err);

    ensure_table(&state.store, table)?;
    let handle = state.store.open_table(table).map_err(failed)?;
    let rows_before = handle.count_rows().map_err(failed)?;
    state.interrupt.checkpoint()?;
    let deleted = handle.delete(predicate).map_err(failed)?;
    let rows_after = handle.count_rows().map_err(failed)?;
    tracing::debug!(table, predicate, rows_before, rows_after, deleted, "delete applied");
    resync(state, table);

    Ok(DeleteReport {
        table: table.to_string(),
        predicate: predicate.to_string(),
        rows_before,
        rows_after,
        deleted,
    })
}

/// Deletes every row of the table
pub fn empty<S: TableStore, G: SqlEngine>(
    state: &mut SessionState<S, G>,
    table: &str,
) -> Result<DeleteReport> {
    delete(state, table, "1=1")
}

/// Drops the table after confirmation, unless `confirmed` is already set
pub fn drop<S: TableStore, G: SqlEngine>(
    state: &mut SessionState<S, G>,
    confirm: &mut dyn Confirm,
    table: &str,
    confirmed: bool,
) -> Result<Outcome<()>> {
    ensure_table(&state.store, table)?;
    if !confirmed {
        let warning = format!(
            "You are about to delete the entire table '{}'\nThis action cannot be undone.",
            table
        );
        let answer = confirm.ask(&warning, DROP_QUESTION)?;
        if !answer.trim().eq_ignore_ascii_case("yes") {
            tracing::debug!(table, "drop declined");
            return Ok(Outcome::Cancelled);
        }
    }

    state
        .store
        .drop_table(table)
        .map_err(|err| Error::store_failure("drop", table, Vec::new(), "", err))?;
    state.views.drop_one(&mut state.engine, table)?;
    tracing::debug!(table, "drop applied");
    Ok(Outcome::Done(()))
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, io, sync::mpsc, thread, time::Duration};

    use super::{Confirm, Outcome, await_answer, delete, drop, empty, update};
    use crate::{
        error::{Error, Result},
        interrupt::Interrupt,
        shell::SessionState,
        sql::{
            engine::{SqlEngine, ViewEngine},
            schema::{Column, Table},
            types::{DataType, Value},
        },
        storage::MemoryEngine,
        store::{KvStore, TableHandle, TableStore},
    };

    /// Replays canned answers and records the questions
    #[derive(Default)]
    struct Scripted {
        answers: VecDeque<&'static str>,
        asked: usize,
    }

    impl Confirm for Scripted {
        fn ask(&mut self, warning: &str, _question: &str) -> Result<String> {
            assert!(warning.contains("cannot be undone"));
            self.asked += 1;
            Ok(self.answers.pop_front().unwrap_or_default().to_string())
        }
    }

    type State = SessionState<KvStore<MemoryEngine>, ViewEngine>;

    fn setup() -> Result<State> {
        let store = KvStore::new(MemoryEngine::new());
        store.create_table(Table {
            name: "speakers".into(),
            columns: vec![
                Column::new("id", DataType::Integer, false),
                Column::new("name", DataType::String, true),
                Column::new("age", DataType::Integer, true),
            ],
        })?;
        store.open_table("speakers")?.insert(vec![
            vec![Value::Integer(1), Value::String("Jane".into()), Value::Integer(34)],
            vec![Value::Integer(2), Value::String("Ravi".into()), Value::Null],
        ])?;
        let interrupt = Interrupt::new();
        SessionState::start(store, ViewEngine::new(interrupt.clone()), interrupt)
    }

    #[test]
    fn test_update() -> Result<()> {
        let mut state = setup()?;
        let report = update(&mut state, "speakers", "name='John', age=40", "WHERE id=1")?;
        assert_eq!(report.columns, vec!["age", "name"]);
        assert_eq!(report.predicate, "id=1");
        assert_eq!(report.updated, 1);

        // the view was refreshed along with the store
        let rows = state.engine.execute("select name, age from speakers where id = 1")?;
        assert_eq!(
            rows.rows,
            vec![vec![Value::String("John".into()), Value::Integer(40)]]
        );
        Ok(())
    }

    #[test]
    fn test_update_failures_leave_rows_alone() -> Result<()> {
        let mut state = setup()?;
        let before = state.store.open_table("speakers")?.scan(None, None)?;

        assert!(matches!(
            update(&mut state, "speakers", "name", "id=1"),
            Err(Error::MalformedClause(_))
        ));
        assert_eq!(
            update(&mut state, "nobody", "name='x'", "id=1"),
            Err(Error::TableNotFound("nobody".into()))
        );
        // a missing table is reported before the clause is looked at
        assert_eq!(
            update(&mut state, "nobody", "name", "id=1"),
            Err(Error::TableNotFound("nobody".into()))
        );
        match update(&mut state, "speakers", "age='old'", "id=1") {
            Err(Error::StoreOperationFailed {
                operation,
                table,
                columns,
                predicate,
                ..
            }) => {
                assert_eq!(operation, "update");
                assert_eq!(table, "speakers");
                assert_eq!(columns, vec!["age"]);
                assert_eq!(predicate, "id=1");
            }
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(state.store.open_table("speakers")?.scan(None, None)?, before);
        Ok(())
    }

    #[test]
    fn test_delete_and_empty() -> Result<()> {
        let mut state = setup()?;
        let report = delete(&mut state, "speakers", "age is null")?;
        assert_eq!((report.rows_before, report.rows_after, report.deleted), (2, 1, 1));
        assert_eq!(state.engine.execute("select * from speakers")?.len(), 1);

        let report = empty(&mut state, "speakers")?;
        assert_eq!((report.rows_before, report.rows_after, report.deleted), (1, 0, 1));
        assert!(state.engine.execute("select * from speakers")?.is_empty());

        assert!(matches!(
            delete(&mut state, "speakers", "id = = 1"),
            Err(Error::StoreOperationFailed { operation: "delete", .. })
        ));
        Ok(())
    }

    #[test]
    fn test_drop() -> Result<()> {
        let mut state = setup()?;
        let mut confirm = Scripted {
            answers: VecDeque::from(["no", "  YES \n"]),
            ..Default::default()
        };

        assert_eq!(drop(&mut state, &mut confirm, "speakers", false)?, Outcome::Cancelled);
        assert_eq!(state.store.list_tables()?, vec!["speakers"]);
        assert_eq!(state.views.names(), vec!["speakers"]);

        assert_eq!(drop(&mut state, &mut confirm, "speakers", false)?, Outcome::Done(()));
        assert!(state.store.list_tables()?.is_empty());
        assert!(state.views.is_empty());
        assert!(state.engine.views().is_empty());
        assert_eq!(confirm.asked, 2);

        assert_eq!(
            drop(&mut state, &mut confirm, "speakers", true),
            Err(Error::TableNotFound("speakers".into()))
        );
        assert_eq!(confirm.asked, 2);
        Ok(())
    }

    #[test]
    fn test_await_answer() -> Result<()> {
        let interrupt = Interrupt::new();

        let (tx, rx) = mpsc::channel::<io::Result<String>>();
        assert!(tx.send(Ok("yes\n".into())).is_ok());
        assert_eq!(await_answer(&rx, &interrupt)?, "yes\n");

        // a reader that goes away without an answer declines
        std::mem::drop(tx);
        assert_eq!(await_answer(&rx, &interrupt)?, "");

        // Ctrl-C while the reader is still blocked ends the prompt
        let (_tx, rx) = mpsc::channel::<io::Result<String>>();
        let raiser = interrupt.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            raiser.trigger();
        });
        assert_eq!(await_answer(&rx, &interrupt), Err(Error::Interrupted));
        handle.join().map_err(|_| Error::Internal("raiser panicked".into()))?;
        Ok(())
    }
}
