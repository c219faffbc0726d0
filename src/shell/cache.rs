use std::{collections::BTreeMap, sync::Arc};

use crate::{
    error::{Error, Result},
    sql::engine::SqlEngine,
    store::{Snapshot, TableHandle, TableStore},
};

/// Outcome of a full view refresh
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RefreshReport {
    pub refreshed: Vec<String>,
    /// Tables that could not be materialized, with the reason
    pub failed: Vec<(String, String)>,
}

/// Table name → snapshot currently registered with the SQL engine.
///
/// An entry exists exactly when the engine holds a view of that name bound to
/// the same snapshot.
#[derive(Debug, Default)]
pub struct ViewCache {
    views: BTreeMap<String, Arc<Snapshot>>,
}

impl ViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds every view from the store. Per-table failures are logged and
    /// reported; failing to list the tables at all is an error.
    pub fn refresh_all<S: TableStore, G: SqlEngine>(
        &mut self,
        store: &S,
        engine: &mut G,
    ) -> Result<RefreshReport> {
        for name in std::mem::take(&mut self.views).into_keys() {
            engine.unregister_view(&name)?;
        }

        let mut report = RefreshReport::default();
        for name in store.list_tables()? {
            match self.load(store, engine, &name) {
                Ok(()) => report.refreshed.push(name),
                Err(err) => {
                    tracing::warn!(table = %name, error = %err, "could not refresh view");
                    report.failed.push((name, err.to_string()));
                }
            }
        }
        tracing::debug!(
            refreshed = report.refreshed.len(),
            failed = report.failed.len(),
            "refreshed views"
        );
        Ok(report)
    }

    /// Rebuilds one view. On failure the stale view is evicted.
    pub fn refresh_one<S: TableStore, G: SqlEngine>(
        &mut self,
        store: &S,
        engine: &mut G,
        name: &str,
    ) -> Result<()> {
        if let Some(other) = self.clash(name) {
            return Err(clash_error(name, other));
        }
        let loaded = self.load(store, engine, name);
        if loaded.is_err() {
            self.drop_one(engine, name)?;
        }
        loaded
    }

    /// Unregisters and evicts a view; unknown names are ignored
    pub fn drop_one<G: SqlEngine>(&mut self, engine: &mut G, name: &str) -> Result<()> {
        // the engine view of that name belongs to a differently cased table
        if self.clash(name).is_none() {
            engine.unregister_view(name)?;
        }
        self.views.remove(name);
        Ok(())
    }

    /// A cached name equal to `name` ignoring case but not exactly.
    /// The engine resolves views case-insensitively, so both cannot be registered.
    fn clash(&self, name: &str) -> Option<&str> {
        self.views
            .keys()
            .find(|k| k.as_str() != name && k.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    fn load<S: TableStore, G: SqlEngine>(
        &mut self,
        store: &S,
        engine: &mut G,
        name: &str,
    ) -> Result<()> {
        if let Some(other) = self.clash(name) {
            return Err(clash_error(name, other));
        }
        let snapshot = Arc::new(store.open_table(name)?.materialize()?);
        engine.register_view(name, snapshot.clone())?;
        self.views.insert(name.to_string(), snapshot);
        Ok(())
    }

    pub fn snapshot(&self, name: &str) -> Option<Arc<Snapshot>> {
        self.views.get(name).cloned()
    }

    /// Cached table names, sorted
    pub fn names(&self) -> Vec<String> {
        self.views.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

fn clash_error(name: &str, other: &str) -> Error {
    Error::Internal(format!(
        "table {} cannot be viewed alongside table {}: view names ignore case",
        name, other
    ))
}
