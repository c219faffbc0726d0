use std::{collections::HashMap, sync::Arc};

use crate::{
    error::{Error, Result},
    interrupt::Interrupt,
    sql::{
        executor::{Catalog, RowSet},
        parser::Parser,
        plan::Plan,
    },
    store::{Snapshot, ViewStatus},
};

/// SQL engine over named views
///
/// Failures come back typed: `Error::ViewDrift` when a view no longer
/// matches the table it mirrors, `Error::Interrupted` when the user stopped
/// the query, and `Error::QueryFailed` for everything else.
pub trait SqlEngine {
    /// Registers `snapshot` under `name`, replacing any existing view
    fn register_view(&mut self, name: &str, snapshot: Arc<Snapshot>) -> Result<()>;
    /// Removes the view; unknown names are ignored
    fn unregister_view(&mut self, name: &str) -> Result<()>;
    fn execute(&mut self, sql: &str) -> Result<RowSet>;
    /// Names of the registered views, sorted
    fn views(&self) -> Vec<String>;
}

/// In-process engine running SELECT statements over registered snapshots
pub struct ViewEngine {
    /// Keyed by lowercased name; view names resolve case-insensitively
    views: HashMap<String, (String, Arc<Snapshot>)>,
    interrupt: Interrupt,
}

impl ViewEngine {
    pub fn new(interrupt: Interrupt) -> Self {
        Self {
            views: HashMap::new(),
            interrupt,
        }
    }
}

impl SqlEngine for ViewEngine {
    fn register_view(&mut self, name: &str, snapshot: Arc<Snapshot>) -> Result<()> {
        tracing::debug!(view = name, rows = snapshot.rows.len(), "register view");
        self.views
            .insert(name.to_lowercase(), (name.to_string(), snapshot));
        Ok(())
    }

    fn unregister_view(&mut self, name: &str) -> Result<()> {
        if self.views.remove(&name.to_lowercase()).is_some() {
            tracing::debug!(view = name, "unregister view");
        }
        Ok(())
    }

    fn execute(&mut self, sql: &str) -> Result<RowSet> {
        let result = Parser::new(sql)
            .parse_query()
            .and_then(Plan::build)
            .and_then(|plan| plan.execute(&*self));
        result.map_err(classify)
    }

    fn views(&self) -> Vec<String> {
        let mut names: Vec<String> = self.views.values().map(|(n, _)| n.clone()).collect();
        names.sort();
        names
    }
}

impl Catalog for ViewEngine {
    fn view(&self, name: &str) -> Result<Arc<Snapshot>> {
        let (registered, snapshot) = self.views.get(&name.to_lowercase()).ok_or_else(|| {
            Error::QueryFailed(format!(
                "Catalog Error: Table with name {} does not exist!",
                name
            ))
        })?;
        match snapshot.status()? {
            ViewStatus::Current => Ok(snapshot.clone()),
            ViewStatus::Altered => Err(Error::ViewDrift(format!(
                "Contents of view were altered: table {} changed after view {} was created",
                snapshot.table.name, registered
            ))),
            ViewStatus::Dropped => Err(Error::ViewDrift(format!(
                "Contents of view were altered: table {} behind view {} no longer exists",
                snapshot.table.name, registered
            ))),
        }
    }

    fn checkpoint(&self) -> Result<()> {
        self.interrupt.checkpoint()
    }
}

/// Folds every failure into the engine's error classes
fn classify(err: Error) -> Error {
    match err {
        Error::ViewDrift(_) | Error::QueryFailed(_) | Error::Interrupted => err,
        Error::Parse(msg) => Error::QueryFailed(format!("Parser Error: {}", msg)),
        other => Error::QueryFailed(other.to_string()),
    }
}
