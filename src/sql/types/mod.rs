use std::{cmp::Ordering, fmt::Display};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sql::parser::ast::Consts;

/// Supported column data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Integer,
    Float,
    String,
}

impl Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DataType::Boolean => "BOOLEAN",
            DataType::Integer => "INTEGER",
            DataType::Float => "FLOAT",
            DataType::String => "STRING",
        })
    }
}

/// Typed scalar stored in rows and produced by expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Value {
    /// Creates a Value from an AST constant
    pub fn from_consts(consts: &Consts) -> Self {
        match consts {
            Consts::Null => Self::Null,
            Consts::Boolean(b) => Self::Boolean(*b),
            Consts::Integer(i) => Self::Integer(*i),
            Consts::Float(f) => Self::Float(*f),
            Consts::String(s) => Self::String(s.clone()),
        }
    }

    /// Returns the data type of the value, or None if it's Null
    pub fn datatype(&self) -> Option<DataType> {
        match self {
            Self::Null => None,
            Self::Boolean(_) => Some(DataType::Boolean),
            Self::Integer(_) => Some(DataType::Integer),
            Self::Float(_) => Some(DataType::Float),
            Self::String(_) => Some(DataType::String),
        }
    }

    /// Name of the value's kind, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Boolean(_) => "BOOLEAN",
            Self::Integer(_) => "INTEGER",
            Self::Float(_) => "FLOAT",
            Self::String(_) => "STRING",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Converts the value so it can be stored in a column of `datatype`.
    ///
    /// Integers widen into float columns; every other mismatch is rejected.
    pub fn cast_to(self, datatype: DataType) -> Result<Value> {
        match (self, datatype) {
            (Value::Null, _) => Ok(Value::Null),
            (Value::Integer(i), DataType::Float) => Ok(Value::Float(i as f64)),
            (v, dt) if v.datatype() == Some(dt) => Ok(v),
            (v, dt) => Err(Error::Internal(format!(
                "cannot store {} value {} in {} column",
                v.kind(),
                v,
                dt
            ))),
        }
    }

    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) if *b => write!(f, "TRUE"),
            Value::Boolean(_) => write!(f, "FALSE"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
        }
    }
}

/// Implements partial ordering for Value comparison (used by ORDER BY, MIN/MAX)
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) => Some(Ordering::Less),
            (_, Value::Null) => Some(Ordering::Greater),
            (Value::Boolean(a), Value::Boolean(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            (_, _) => None,
        }
    }
}

/// A row is a vector of values
pub type Row = Vec<Value>;

#[cfg(test)]
mod tests {
    use super::{DataType, Value};
    use crate::error::Result;

    #[test]
    fn test_cast_to() -> Result<()> {
        assert_eq!(Value::Integer(3).cast_to(DataType::Float)?, Value::Float(3.0));
        assert_eq!(Value::Null.cast_to(DataType::Boolean)?, Value::Null);
        assert_eq!(
            Value::String("a".into()).cast_to(DataType::String)?,
            Value::String("a".into())
        );
        assert!(Value::Float(1.5).cast_to(DataType::Integer).is_err());
        assert!(Value::String("x".into()).cast_to(DataType::Integer).is_err());
        Ok(())
    }

    #[test]
    fn test_ordering() {
        assert!(Value::Null < Value::Integer(0));
        assert!(Value::Integer(2) < Value::Float(2.5));
        assert_eq!(Value::String("a".into()).partial_cmp(&Value::Integer(1)), None);
    }
}
