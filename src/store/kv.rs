use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    error::{Error, Result},
    sql::{
        eval::{Label, is_true},
        parser::Parser,
        schema::Table,
        types::{Row, Value},
    },
    storage::engine::Engine as StorageEngine,
    store::{Snapshot, TableHandle, TableStore, ViewStatus, Watermark},
};

/// Key-value backed table store
///
/// Schemas and rows are bincode-encoded under [`Key`]s. Every change to a
/// table stamps it with a fresh version from a store-wide clock, which is
/// what snapshot watermarks compare against.
pub struct KvStore<E: StorageEngine> {
    engine: Arc<Mutex<E>>,
}

impl<E: StorageEngine> Clone for KvStore<E> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<E: StorageEngine> KvStore<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
        }
    }
}

impl<E: StorageEngine + 'static> TableStore for KvStore<E> {
    type Handle = KvTable<E>;

    fn list_tables(&self) -> Result<Vec<String>> {
        let mut engine = self.engine.lock()?;
        let mut names = table_names(&mut *engine)?;
        names.sort();
        Ok(names)
    }

    fn open_table(&self, name: &str) -> Result<Self::Handle> {
        let mut engine = self.engine.lock()?;
        let table = must_get_table(&mut *engine, name)?;
        Ok(KvTable {
            engine: self.engine.clone(),
            name: table.name,
        })
    }

    fn create_table(&self, schema: Table) -> Result<()> {
        schema.validate()?;
        let mut engine = self.engine.lock()?;
        // Table names are unique ignoring case
        if let Some(name) = table_names(&mut *engine)?
            .iter()
            .find(|n| n.eq_ignore_ascii_case(&schema.name))
        {
            return Err(Error::Internal(format!("table {} already exists", name)));
        }

        // Store table schema: key = table name, value = serialized table schema
        put(&mut *engine, &Key::Table(schema.name.clone()), &schema)?;
        put(&mut *engine, &Key::NextRowId(schema.name.clone()), &0u64)?;
        bump(&mut *engine, &schema.name)?;
        engine.flush()?;
        tracing::debug!(table = %schema.name, "created table");
        Ok(())
    }

    fn drop_table(&self, name: &str) -> Result<()> {
        let mut engine = self.engine.lock()?;
        must_get_table(&mut *engine, name)?;
        for (key, _) in scan_rows(&mut *engine, name)? {
            engine.delete(key)?;
        }
        engine.delete(bincode::serialize(&Key::NextRowId(name.to_string()))?)?;
        engine.delete(bincode::serialize(&Key::Version(name.to_string()))?)?;
        engine.delete(bincode::serialize(&Key::Table(name.to_string()))?)?;
        engine.flush()?;
        tracing::debug!(table = %name, "dropped table");
        Ok(())
    }
}

/// Handle to one table of a [`KvStore`]
pub struct KvTable<E: StorageEngine> {
    engine: Arc<Mutex<E>>,
    name: String,
}

impl<E: StorageEngine + 'static> TableHandle for KvTable<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Result<Table> {
        let mut engine = self.engine.lock()?;
        must_get_table(&mut *engine, &self.name)
    }

    fn count_rows(&self) -> Result<usize> {
        let mut engine = self.engine.lock()?;
        must_get_table(&mut *engine, &self.name)?;
        let prefix = bincode::serialize(&KeyPrefix::Row(self.name.clone()))?;
        Ok(engine.scan_prefix(prefix).count())
    }

    fn materialize(&self) -> Result<Snapshot> {
        let mut engine = self.engine.lock()?;
        let table = must_get_table(&mut *engine, &self.name)?;
        let rows = scan_rows(&mut *engine, &self.name)?
            .into_iter()
            .map(|(_, row)| row)
            .collect();
        let version = get::<u64, _>(&mut *engine, &Key::Version(self.name.clone()))?.unwrap_or(0);
        let watermark = KvWatermark {
            engine: self.engine.clone(),
            table: self.name.clone(),
            version,
        };
        Ok(Snapshot::new(table, rows, Box::new(watermark)))
    }

    fn scan(&self, predicate: Option<&str>, limit: Option<usize>) -> Result<Vec<Row>> {
        let mut engine = self.engine.lock()?;
        let table = must_get_table(&mut *engine, &self.name)?;
        let rows = scan_rows(&mut *engine, &self.name)?;
        let rows = match predicate {
            Some(predicate) => matching(&table, rows, predicate)?,
            None => rows,
        };
        Ok(rows
            .into_iter()
            .map(|(_, row)| row)
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }

    fn insert(&self, rows: Vec<Row>) -> Result<usize> {
        let mut engine = self.engine.lock()?;
        let table = must_get_table(&mut *engine, &self.name)?;

        // Validate every row before writing any
        let rows = rows
            .into_iter()
            .map(|row| conform(&table, row))
            .collect::<Result<Vec<_>>>()?;

        let id_key = Key::NextRowId(self.name.clone());
        let mut next_id = get::<u64, _>(&mut *engine, &id_key)?.unwrap_or(0);
        for row in &rows {
            // Big-endian ids keep rows in insertion order under prefix scans
            let key = Key::Row(self.name.clone(), next_id.to_be_bytes().to_vec());
            put(&mut *engine, &key, row)?;
            next_id += 1;
        }
        put(&mut *engine, &id_key, &next_id)?;
        if !rows.is_empty() {
            bump(&mut *engine, &self.name)?;
        }
        engine.flush()?;
        Ok(rows.len())
    }

    fn delete(&self, predicate: &str) -> Result<usize> {
        let mut engine = self.engine.lock()?;
        let table = must_get_table(&mut *engine, &self.name)?;
        let rows = scan_rows(&mut *engine, &self.name)?;
        let doomed = matching(&table, rows, predicate)?;
        for (key, _) in &doomed {
            engine.delete(key.clone())?;
        }
        if !doomed.is_empty() {
            bump(&mut *engine, &self.name)?;
        }
        engine.flush()?;
        tracing::debug!(table = %self.name, predicate, deleted = doomed.len(), "deleted rows");
        Ok(doomed.len())
    }

    fn update(&self, predicate: &str, assignments: &BTreeMap<String, Value>) -> Result<usize> {
        let mut engine = self.engine.lock()?;
        let table = must_get_table(&mut *engine, &self.name)?;

        // Resolve and convert every assignment up front
        let mut columns = Vec::with_capacity(assignments.len());
        for (column, value) in assignments {
            let index = table.get_col_index(column)?;
            let value = value.clone().cast_to(table.columns[index].datatype)?;
            columns.push((index, value));
        }

        let rows = scan_rows(&mut *engine, &self.name)?;
        let mut updated = Vec::new();
        for (key, mut row) in matching(&table, rows, predicate)? {
            for (index, value) in &columns {
                row[*index] = value.clone();
            }
            table.check_row(&row)?;
            updated.push((key, row));
        }

        for (key, row) in &updated {
            engine.set(key.clone(), bincode::serialize(row)?)?;
        }
        if !updated.is_empty() {
            bump(&mut *engine, &self.name)?;
        }
        engine.flush()?;
        tracing::debug!(table = %self.name, predicate, updated = updated.len(), "updated rows");
        Ok(updated.len())
    }
}

/// Compares the table's current version with the one a snapshot was taken at
struct KvWatermark<E: StorageEngine> {
    engine: Arc<Mutex<E>>,
    table: String,
    version: u64,
}

impl<E: StorageEngine> Watermark for KvWatermark<E> {
    fn status(&self) -> Result<ViewStatus> {
        let mut engine = self.engine.lock()?;
        Ok(
            match get::<u64, _>(&mut *engine, &Key::Version(self.table.clone()))? {
                None => ViewStatus::Dropped,
                Some(v) if v == self.version => ViewStatus::Current,
                Some(_) => ViewStatus::Altered,
            },
        )
    }
}

/// Key types for KV storage operations
///
/// In bincode, enums are serialized as [variant_index][variant_data...], so
/// the variant order here must line up with [`KeyPrefix`].
#[derive(Debug, Serialize, Deserialize)]
enum Key {
    Table(String),
    Row(String, #[serde(with = "serde_bytes")] Vec<u8>),
    NextRowId(String),
    Version(String),
    Clock,
}

/// Key prefix types for prefix scanning
#[derive(Debug, Serialize, Deserialize)]
enum KeyPrefix {
    Table,
    Row(String),
}

fn get<T: DeserializeOwned, E: StorageEngine>(engine: &mut E, key: &Key) -> Result<Option<T>> {
    engine
        .get(bincode::serialize(key)?)?
        .map(|v| bincode::deserialize(&v))
        .transpose()
        .map_err(Error::from)
}

fn put<T: Serialize + ?Sized, E: StorageEngine>(
    engine: &mut E,
    key: &Key,
    value: &T,
) -> Result<()> {
    engine.set(bincode::serialize(key)?, bincode::serialize(value)?)
}

fn get_table<E: StorageEngine>(engine: &mut E, name: &str) -> Result<Option<Table>> {
    get(engine, &Key::Table(name.to_string()))
}

fn table_names<E: StorageEngine>(engine: &mut E) -> Result<Vec<String>> {
    let prefix = bincode::serialize(&KeyPrefix::Table)?;
    engine
        .scan_prefix(prefix)
        .map(|r| -> Result<String> {
            let (_, value) = r?;
            Ok(bincode::deserialize::<Table>(&value)?.name)
        })
        .collect()
}

/// Returns table info, returns error if table doesn't exist
fn must_get_table<E: StorageEngine>(engine: &mut E, name: &str) -> Result<Table> {
    get_table(engine, name)?.ok_or_else(|| Error::TableNotFound(name.to_string()))
}

/// All rows of a table with their storage keys, in insertion order
fn scan_rows<E: StorageEngine>(engine: &mut E, name: &str) -> Result<Vec<(Vec<u8>, Row)>> {
    // Use prefix scan to find all rows in the table
    let prefix = bincode::serialize(&KeyPrefix::Row(name.to_string()))?;
    engine
        .scan_prefix(prefix)
        .map(|r| -> Result<(Vec<u8>, Row)> {
            let (key, value) = r?;
            Ok((key, bincode::deserialize(&value)?))
        })
        .collect()
}

/// Stamps `table` with the next value of the store clock
fn bump<E: StorageEngine>(engine: &mut E, table: &str) -> Result<u64> {
    let version = get::<u64, _>(engine, &Key::Clock)?.unwrap_or(0) + 1;
    put(engine, &Key::Clock, &version)?;
    put(engine, &Key::Version(table.to_string()), &version)?;
    Ok(version)
}

/// Rows of `rows` for which `predicate` holds
fn matching(
    table: &Table,
    rows: Vec<(Vec<u8>, Row)>,
    predicate: &str,
) -> Result<Vec<(Vec<u8>, Row)>> {
    let expr = Parser::new(predicate).parse_predicate()?;
    let labels: Vec<Label> = table
        .columns
        .iter()
        .map(|c| Label::new(Some(&table.name), &c.name))
        .collect();
    let mut kept = Vec::new();
    for (key, row) in rows {
        if is_true(&expr, &labels, &row)? {
            kept.push((key, row));
        }
    }
    Ok(kept)
}

/// Converts a row's values to the column types and validates it
fn conform(table: &Table, row: Row) -> Result<Row> {
    if row.len() != table.columns.len() {
        return Err(Error::Internal(format!(
            "table {} expects {} values, got {}",
            table.name,
            table.columns.len(),
            row.len()
        )));
    }
    let row = row
        .into_iter()
        .zip(&table.columns)
        .map(|(value, column)| value.cast_to(column.datatype))
        .collect::<Result<Row>>()?;
    table.check_row(&row)?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::KvStore;
    use crate::{
        error::{Error, Result},
        sql::{
            schema::{Column, Table},
            types::{DataType, Value},
        },
        storage::{disk::DiskEngine, memory::MemoryEngine},
        store::{TableHandle, TableStore, ViewStatus},
    };

    fn orders() -> Table {
        Table {
            name: "orders".into(),
            columns: vec![
                Column::new("id", DataType::Integer, false),
                Column::new("amount", DataType::Float, true),
            ],
        }
    }

    fn seed<S: TableStore>(store: &S) -> Result<S::Handle> {
        store.create_table(orders())?;
        let table = store.open_table("orders")?;
        table.insert(
            (1..=5)
                .map(|i| vec![Value::Integer(i), Value::Integer(i * 10 - 25)])
                .collect(),
        )?;
        Ok(table)
    }

    #[test]
    fn test_create_and_list() -> Result<()> {
        let store = KvStore::new(MemoryEngine::new());
        store.create_table(orders())?;
        store.create_table(Table {
            name: "customers".into(),
            columns: vec![Column::new("id", DataType::Integer, false)],
        })?;
        assert_eq!(store.list_tables()?, vec!["customers", "orders"]);
        assert!(store.create_table(orders()).is_err());
        let mut shouting = orders();
        shouting.name = "ORDERS".into();
        assert_eq!(
            store.create_table(shouting),
            Err(Error::Internal("table orders already exists".into()))
        );
        assert_eq!(store.list_tables()?, vec!["customers", "orders"]);
        assert_eq!(
            store.open_table("missing").err(),
            Some(Error::TableNotFound("missing".into()))
        );
        Ok(())
    }

    #[test]
    fn test_insert_scan() -> Result<()> {
        let store = KvStore::new(MemoryEngine::new());
        let table = seed(&store)?;
        assert_eq!(table.count_rows()?, 5);

        // integers widen into the float column
        let rows = table.scan(Some("amount < 0"), None)?;
        assert_eq!(
            rows,
            vec![
                vec![Value::Integer(1), Value::Float(-15.0)],
                vec![Value::Integer(2), Value::Float(-5.0)],
            ]
        );
        assert_eq!(table.scan(None, Some(3))?.len(), 3);

        assert!(table.insert(vec![vec![Value::Null, Value::Null]]).is_err());
        assert!(table.insert(vec![vec![Value::String("x".into()), Value::Null]]).is_err());
        assert_eq!(table.count_rows()?, 5);
        Ok(())
    }

    #[test]
    fn test_delete_update() -> Result<()> {
        let store = KvStore::new(MemoryEngine::new());
        let table = seed(&store)?;

        assert_eq!(table.delete("amount < 0")?, 2);
        assert_eq!(table.count_rows()?, 3);
        assert_eq!(table.delete("id > 100")?, 0);

        let mut assignments = BTreeMap::new();
        assignments.insert("amount".to_string(), Value::Integer(0));
        assert_eq!(table.update("id >= 4", &assignments)?, 2);
        assert_eq!(table.scan(Some("amount = 0"), None)?.len(), 2);

        // unknown column and wrong type are rejected without writing
        let mut bad = BTreeMap::new();
        bad.insert("total".to_string(), Value::Integer(1));
        assert!(table.update("id = 3", &bad).is_err());
        let mut bad = BTreeMap::new();
        bad.insert("id".to_string(), Value::String("three".into()));
        assert!(table.update("id = 3", &bad).is_err());
        assert_eq!(table.scan(Some("id = 3"), None)?.len(), 1);

        assert!(table.delete("amount <").is_err());
        Ok(())
    }

    #[test]
    fn test_watermark() -> Result<()> {
        let store = KvStore::new(MemoryEngine::new());
        let table = seed(&store)?;
        let snapshot = table.materialize()?;
        assert_eq!(snapshot.rows.len(), 5);
        assert_eq!(snapshot.status()?, ViewStatus::Current);

        // a no-op delete leaves the snapshot current
        table.delete("id > 100")?;
        assert_eq!(snapshot.status()?, ViewStatus::Current);

        // another handle to the same store changes the table
        store.clone().open_table("orders")?.delete("id = 1")?;
        assert_eq!(snapshot.status()?, ViewStatus::Altered);

        let fresh = table.materialize()?;
        assert_eq!(fresh.status()?, ViewStatus::Current);

        store.drop_table("orders")?;
        assert_eq!(fresh.status()?, ViewStatus::Dropped);
        assert!(store.list_tables()?.is_empty());

        // a table recreated under the same name is still a different table
        seed(&store)?;
        assert_eq!(fresh.status()?, ViewStatus::Altered);
        Ok(())
    }

    #[test]
    fn test_disk_persistence() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("shop.lsql");
        {
            let store = KvStore::new(DiskEngine::open(&path)?);
            seed(&store)?.delete("id = 5")?;
        }
        let store = KvStore::new(DiskEngine::open(&path)?);
        assert_eq!(store.list_tables()?, vec!["orders"]);
        let table = store.open_table("orders")?;
        assert_eq!(table.count_rows()?, 4);

        // row ids keep growing after reopen
        table.insert(vec![vec![Value::Integer(6), Value::Null]])?;
        let ids: Vec<Value> = table.scan(None, None)?.into_iter().map(|r| r[0].clone()).collect();
        assert_eq!(ids, [1, 2, 3, 4, 6].map(Value::Integer).to_vec());
        Ok(())
    }
}
