use std::{array::TryFromSliceError, string::FromUtf8Error, sync::PoisonError};

use bincode::ErrorKind;

/// Custom Result type for lsql operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for lsql
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// SQL or predicate parsing error
    #[error("parse error {0}")]
    Parse(String),
    /// A SET clause fragment is not a single `key=value` assignment
    #[error("{0}")]
    MalformedClause(String),
    /// The table is not in the store's current table list
    #[error("Table '{0}' not found")]
    TableNotFound(String),
    /// The store rejected a delete/update/drop
    #[error("{operation} on '{table}' failed: {message}")]
    StoreOperationFailed {
        operation: &'static str,
        table: String,
        columns: Vec<String>,
        predicate: String,
        message: String,
    },
    /// A registered view no longer matches the table it was taken from
    #[error("view drift: {0}")]
    ViewDrift(String),
    /// Any other engine execution failure
    #[error("{0}")]
    QueryFailed(String),
    /// The running command was interrupted by the user
    #[error("Interrupted")]
    Interrupted,
    /// Configuration file error
    #[error("configuration error {0}")]
    Config(String),
    /// Internal error (storage, serialization, io, etc.)
    #[error("internal error {0}")]
    Internal(String),
}

impl Error {
    /// Wraps a store failure with the context of the attempted operation
    pub fn store_failure(
        operation: &'static str,
        table: &str,
        columns: Vec<String>,
        predicate: &str,
        cause: Error,
    ) -> Self {
        Error::StoreOperationFailed {
            operation,
            table: table.to_string(),
            columns,
            predicate: predicate.to_string(),
            message: cause.to_string(),
        }
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(value: std::num::ParseIntError) -> Self {
        Error::Parse(value.to_string())
    }
}

impl From<std::num::ParseFloatError> for Error {
    fn from(value: std::num::ParseFloatError) -> Self {
        Error::Parse(value.to_string())
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(value: PoisonError<T>) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<Box<ErrorKind>> for Error {
    fn from(value: Box<ErrorKind>) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<TryFromSliceError> for Error {
    fn from(value: TryFromSliceError) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<FromUtf8Error> for Error {
    fn from(value: FromUtf8Error) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(value: toml::de::Error) -> Self {
        Error::Config(format!("TOML parse error: {}", value))
    }
}

impl From<rustyline::error::ReadlineError> for Error {
    fn from(value: rustyline::error::ReadlineError) -> Self {
        match value {
            rustyline::error::ReadlineError::Interrupted => Error::Interrupted,
            e => Error::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn test_error_display() {
        let err = Error::TableNotFound("orders".into());
        assert_eq!(err.to_string(), "Table 'orders' not found");

        let err = Error::store_failure(
            "update",
            "speakers",
            vec!["age".into()],
            "id = 1",
            Error::Internal("column age type mismatch".into()),
        );
        assert_eq!(
            err.to_string(),
            "update on 'speakers' failed: internal error column age type mismatch"
        );
    }
}
