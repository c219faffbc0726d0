use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    sql::types::{DataType, Row},
};

/// Table schema definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    /// Validates table schema
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Internal("table name is empty".into()));
        }
        if self.columns.is_empty() {
            return Err(Error::Internal(format!(
                "table {} has no columns",
                self.name
            )));
        }
        for (i, column) in self.columns.iter().enumerate() {
            if self.columns[..i]
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&column.name))
            {
                return Err(Error::Internal(format!(
                    "duplicate column {} in table {}",
                    column.name, self.name
                )));
            }
        }
        Ok(())
    }

    /// Returns the column index for a given column name.
    ///
    /// An exact match wins; otherwise names are compared case-insensitively.
    pub fn get_col_index(&self, col_name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == col_name)
            .or_else(|| {
                self.columns
                    .iter()
                    .position(|c| c.name.eq_ignore_ascii_case(col_name))
            })
            .ok_or(Error::Internal(format!(
                "column {} not found in table {}",
                col_name, self.name
            )))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Checks that a row fits the column types and nullability
    pub fn check_row(&self, row: &Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::Internal(format!(
                "table {} expects {} values, got {}",
                self.name,
                self.columns.len(),
                row.len()
            )));
        }
        for (col, value) in self.columns.iter().zip(row) {
            match value.datatype() {
                None if col.nullable => {}
                None => {
                    return Err(Error::Internal(format!(
                        "column {} cannot be null",
                        col.name
                    )))
                }
                Some(dt) if dt != col.datatype => {
                    return Err(Error::Internal(format!(
                        "column {} type mismatch: expected {}, got {}",
                        col.name, col.datatype, dt
                    )))
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for column in &self.columns {
            write!(f, "{}: {}", column.name, column.datatype)?;
            if !column.nullable {
                write!(f, " not null")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Column schema definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub datatype: DataType,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, datatype: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            datatype,
            nullable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Column, Table};
    use crate::{
        error::Result,
        sql::types::{DataType, Value},
    };

    fn speakers() -> Table {
        Table {
            name: "speakers".into(),
            columns: vec![
                Column::new("id", DataType::Integer, false),
                Column::new("Name", DataType::String, true),
            ],
        }
    }

    #[test]
    fn test_get_col_index() -> Result<()> {
        let table = speakers();
        assert_eq!(table.get_col_index("id")?, 0);
        assert_eq!(table.get_col_index("name")?, 1);
        assert!(table.get_col_index("age").is_err());
        Ok(())
    }

    #[test]
    fn test_check_row() -> Result<()> {
        let table = speakers();
        table.check_row(&vec![Value::Integer(1), Value::Null])?;
        assert!(table.check_row(&vec![Value::Null, Value::Null]).is_err());
        assert!(table.check_row(&vec![Value::String("1".into()), Value::Null]).is_err());
        assert!(table.check_row(&vec![Value::Integer(1)]).is_err());
        Ok(())
    }

    #[test]
    fn test_validate_duplicate_columns() {
        let mut table = speakers();
        table.columns.push(Column::new("ID", DataType::Integer, true));
        assert!(table.validate().is_err());
    }
}
