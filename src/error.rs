use std::sync::PoisonError;

/// Custom Result type for sqlsource operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for sqlsource
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A required capability or setting is missing at startup
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The op/path combination has no handler
    #[error("operation not allowed: {op} with path: {path}")]
    UnsupportedOperation { op: String, path: String },
    /// An update or delete matched zero rows
    #[error("no row in {table} with id {id}")]
    NotFound { table: String, id: String },
    /// The type was never registered with the source
    #[error("unknown model {0}")]
    UnknownModel(String),
    /// Failure reported by the SQL engine, verbatim
    #[error("engine error: {0}")]
    Engine(String),
    /// Internal error (encoding, locking, payload shape)
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        Error::Engine(value.to_string())
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(value: PoisonError<T>) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(value: bincode::Error) -> Self {
        Error::Internal(value.to_string())
    }
}
