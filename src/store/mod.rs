//! Table store: the persistent side of the shell.
//!
//! The shell reaches tables only through [`TableStore`] and [`TableHandle`].
//! Materialized [`Snapshot`]s carry a [`Watermark`] so the SQL engine can tell
//! when the table behind a view has changed.

use std::{collections::BTreeMap, fmt::Debug};

use crate::{
    error::Result,
    sql::{
        schema::Table,
        types::{Row, Value},
    },
};

pub mod kv;

pub use kv::KvStore;

/// How a snapshot relates to the table it was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewStatus {
    Current,
    Altered,
    Dropped,
}

/// Reports whether a snapshot's source table has changed since materialization
pub trait Watermark {
    fn status(&self) -> Result<ViewStatus>;
}

/// A watermark for data that never changes underneath
pub struct Fixed;

impl Watermark for Fixed {
    fn status(&self) -> Result<ViewStatus> {
        Ok(ViewStatus::Current)
    }
}

/// Materialized contents of a table at one point in time
pub struct Snapshot {
    pub table: Table,
    pub rows: Vec<Row>,
    watermark: Box<dyn Watermark>,
}

impl Snapshot {
    pub fn new(table: Table, rows: Vec<Row>, watermark: Box<dyn Watermark>) -> Self {
        Self {
            table,
            rows,
            watermark,
        }
    }

    /// A snapshot that always reports itself current
    pub fn fixed(table: Table, rows: Vec<Row>) -> Self {
        Self::new(table, rows, Box::new(Fixed))
    }

    pub fn status(&self) -> Result<ViewStatus> {
        self.watermark.status()
    }
}

impl Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("table", &self.table.name)
            .field("columns", &self.table.columns.len())
            .field("rows", &self.rows.len())
            .finish()
    }
}

/// Catalog-level operations of a table store
pub trait TableStore {
    type Handle: TableHandle;

    /// Names of all tables, sorted
    fn list_tables(&self) -> Result<Vec<String>>;
    /// Opens a table; `Error::TableNotFound` if it does not exist
    fn open_table(&self, name: &str) -> Result<Self::Handle>;
    fn create_table(&self, schema: Table) -> Result<()>;
    fn drop_table(&self, name: &str) -> Result<()>;
}

/// Operations on one open table.
///
/// Predicates are WHERE expressions in the engine's SQL expression language.
pub trait TableHandle {
    fn name(&self) -> &str;
    fn schema(&self) -> Result<Table>;
    fn count_rows(&self) -> Result<usize>;
    fn materialize(&self) -> Result<Snapshot>;
    /// Rows matching `predicate` (all rows if `None`), in insertion order
    fn scan(&self, predicate: Option<&str>, limit: Option<usize>) -> Result<Vec<Row>>;
    /// Appends rows, returning how many were written
    fn insert(&self, rows: Vec<Row>) -> Result<usize>;
    /// Deletes matching rows, returning how many were removed
    fn delete(&self, predicate: &str) -> Result<usize>;
    /// Assigns `assignments` (column → value) on matching rows, returning how many changed
    fn update(&self, predicate: &str, assignments: &BTreeMap<String, Value>) -> Result<usize>;
}
