use crate::{
    error::{Error, Result},
    shell::SessionState,
    sql::{engine::SqlEngine, executor::RowSet},
    store::TableStore,
};

/// One engine call, classified
#[derive(Debug)]
pub enum Attempt {
    Ok(RowSet),
    /// A view no longer matches its table; a refresh may fix it
    Drifted(Error),
    Failed(Error),
}

impl Attempt {
    fn run<G: SqlEngine>(engine: &mut G, sql: &str) -> Self {
        match engine.execute(sql) {
            Ok(rows) => Attempt::Ok(rows),
            Err(err @ Error::ViewDrift(_)) => Attempt::Drifted(err),
            Err(err) => Attempt::Failed(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub rows: RowSet,
    /// Views were refreshed and the query ran a second time
    pub retried: bool,
}

/// Runs `sql`, refreshing every view and retrying once if the engine
/// reports drift. The second attempt is final.
pub fn run<S: TableStore, G: SqlEngine>(
    state: &mut SessionState<S, G>,
    sql: &str,
) -> Result<QueryOutcome> {
    match Attempt::run(&mut state.engine, sql) {
        Attempt::Ok(rows) => Ok(QueryOutcome {
            rows,
            retried: false,
        }),
        Attempt::Failed(err) => Err(err),
        Attempt::Drifted(err) => {
            tracing::debug!(error = %err, "view drift, refreshing all views");
            state.views.refresh_all(&state.store, &mut state.engine)?;
            state.interrupt.checkpoint()?;
            match Attempt::run(&mut state.engine, sql) {
                Attempt::Ok(rows) => Ok(QueryOutcome {
                    rows,
                    retried: true,
                }),
                Attempt::Drifted(err) | Attempt::Failed(err) => Err(err),
            }
        }
    }
}
