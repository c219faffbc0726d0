//! Loading a JSON array of objects into a new table.
//!
//! Column types are inferred from the values seen: integers widen to float
//! when mixed with fractions, and anything else mixed becomes a string.

use serde_json::{Map, Value as Json};

use crate::{
    error::{Error, Result},
    sql::{
        schema::{Column, Table},
        types::{DataType, Row, Value},
    },
    store::{TableHandle, TableStore},
};

type Record = Map<String, Json>;

fn kind(value: &Json) -> Option<DataType> {
    match value {
        Json::Null => None,
        Json::Bool(_) => Some(DataType::Boolean),
        Json::Number(n) if n.is_i64() => Some(DataType::Integer),
        Json::Number(_) => Some(DataType::Float),
        _ => Some(DataType::String),
    }
}

fn widen(seen: Option<DataType>, next: Option<DataType>) -> Option<DataType> {
    match (seen, next) {
        (None, t) | (t, None) => t,
        (Some(a), Some(b)) if a == b => Some(a),
        (Some(DataType::Integer), Some(DataType::Float))
        | (Some(DataType::Float), Some(DataType::Integer)) => Some(DataType::Float),
        _ => Some(DataType::String),
    }
}

/// Infers a schema from the records, keeping columns in first-seen order
pub fn infer_schema(name: &str, records: &[Record]) -> Result<Table> {
    let mut columns: Vec<(String, Option<DataType>, bool)> = Vec::new();
    for record in records {
        for (key, value) in record {
            match columns.iter_mut().find(|(k, _, _)| k == key) {
                Some((_, datatype, nullable)) => {
                    *datatype = widen(*datatype, kind(value));
                    *nullable |= value.is_null();
                }
                None => columns.push((key.clone(), kind(value), value.is_null())),
            }
        }
    }
    let table = Table {
        name: name.to_string(),
        columns: columns
            .into_iter()
            .map(|(key, datatype, nullable)| {
                // a key missing from any record leaves nulls behind
                let nullable = nullable || records.iter().any(|r| !r.contains_key(&key));
                Column::new(key, datatype.unwrap_or(DataType::String), nullable)
            })
            .collect(),
    };
    table.validate()?;
    Ok(table)
}

fn convert(value: Option<&Json>, datatype: DataType) -> Value {
    match (value, datatype) {
        (None | Some(Json::Null), _) => Value::Null,
        (Some(Json::Bool(b)), DataType::Boolean) => Value::Boolean(*b),
        (Some(Json::Number(n)), DataType::Integer) => {
            n.as_i64().map(Value::Integer).unwrap_or(Value::Null)
        }
        (Some(Json::Number(n)), DataType::Float) => {
            n.as_f64().map(Value::Float).unwrap_or(Value::Null)
        }
        (Some(Json::String(s)), _) => Value::String(s.clone()),
        (Some(other), _) => Value::String(other.to_string()),
    }
}

pub fn to_rows(table: &Table, records: &[Record]) -> Vec<Row> {
    records
        .iter()
        .map(|record| {
            table
                .columns
                .iter()
                .map(|c| convert(record.get(&c.name), c.datatype))
                .collect()
        })
        .collect()
}

/// Creates `table` from `json` and returns the number of rows written
pub fn import_json<S: TableStore>(store: &S, table: &str, json: &str) -> Result<usize> {
    let records: Vec<Record> = match serde_json::from_str::<Json>(json)? {
        Json::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Json::Object(record) => Ok(record),
                other => Err(Error::Internal(format!(
                    "expected a JSON object per row, found {}",
                    other
                ))),
            })
            .collect::<Result<_>>()?,
        _ => return Err(Error::Internal("expected a JSON array of objects".into())),
    };
    if records.is_empty() {
        return Err(Error::Internal("no records to import".into()));
    }

    let schema = infer_schema(table, &records)?;
    let rows = to_rows(&schema, &records);
    store.create_table(schema)?;
    let written = store.open_table(table)?.insert(rows)?;
    tracing::debug!(table, rows = written, "imported json");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::import_json;
    use crate::{
        error::{Error, Result},
        sql::types::{DataType, Value},
        storage::MemoryEngine,
        store::{KvStore, TableHandle, TableStore},
    };

    #[test]
    fn test_import_json() -> Result<()> {
        let store = KvStore::new(MemoryEngine::new());
        let json = r#"[
            {"id": 1, "name": "Jane", "score": 3, "tags": ["a"]},
            {"id": 2, "name": null, "score": 4.5, "active": true}
        ]"#;
        assert_eq!(import_json(&store, "people", json)?, 2);

        let table = store.open_table("people")?;
        let schema = table.schema()?;
        let types: Vec<_> = schema
            .columns
            .iter()
            .map(|c| (c.name.as_str(), c.datatype, c.nullable))
            .collect();
        assert_eq!(
            types,
            vec![
                ("id", DataType::Integer, false),
                ("name", DataType::String, true),
                ("score", DataType::Float, false),
                ("tags", DataType::String, true),
                ("active", DataType::Boolean, true),
            ]
        );
        assert_eq!(
            table.scan(None, None)?[0],
            vec![
                Value::Integer(1),
                Value::String("Jane".into()),
                Value::Float(3.0),
                Value::String("[\"a\"]".into()),
                Value::Null,
            ]
        );

        assert!(matches!(
            import_json(&store, "people", json),
            Err(Error::Internal(m)) if m.contains("already exists")
        ));
        assert!(import_json(&store, "bad", r#"{"id": 1}"#).is_err());
        assert!(import_json(&store, "bad", "[1, 2]").is_err());
        assert!(import_json(&store, "bad", "[]").is_err());
        assert!(!store.list_tables()?.contains(&"bad".to_string()));
        Ok(())
    }
}
