/// Websetup Error Module
///
/// This module defines the error type shared by the database layer and the
/// configuration loader. Driver errors are boxed into `DbError::Database`, so
/// no driver-specific error type leaks out of the crate.
use thiserror::Error;

/// Boxed driver failure carried by `DbError::Database`.
pub type DriverFailure = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for every fallible operation in websetup.
///
/// The variants cover:
/// - Driver setup (uninitialized, unsupported, initialized twice)
/// - Query results (multi-column scalars, missing rows, missing fields)
/// - Caller mistakes (empty field maps, malformed identifiers)
/// - Raw driver failures and failed transaction completion
/// - Configuration loading
#[derive(Error, Debug)]
pub enum DbError {
    /// No driver has been configured for this process
    #[error("Database is not initialized. Call initialize() first")]
    UninitializedDatabase,

    /// `initialize` was called after a driver had already been recorded
    #[error("Database is already initialized")]
    AlreadyInitialized,

    /// Requested driver kind is unknown or not compiled in
    #[error("Unsupported database kind: {0}")]
    UnsupportedDriver(String),

    /// A scalar query produced a row with more than one column
    #[error("Expected exactly one column, found {0}")]
    MultiColumn(usize),

    /// A query that needs a row produced none
    #[error("Query returned no rows")]
    NoRow,

    /// Record lookup by a name the result set does not contain
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    /// A value could not be converted to the requested Rust type
    #[error("Conversion error: expected {expected}, found {found}")]
    Conversion {
        expected: &'static str,
        found: &'static str,
    },

    /// Caller passed arguments that cannot form a valid statement
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Raw driver failure: connect, execute, commit, rollback
    #[error("Database error: {0}")]
    Database(#[source] DriverFailure),

    /// A transaction could not be completed; `rollback` holds the outcome of
    /// the recovery attempt when that also failed
    #[error("Transaction error: {cause}{}", rollback_outcome(.rollback))]
    Transaction {
        #[source]
        cause: Box<DbError>,
        rollback: Option<Box<DbError>>,
    },

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbError {
    /// Builds a `Database` error from a plain message.
    pub fn database(message: impl Into<String>) -> Self {
        let message: String = message.into();
        DbError::Database(message.into())
    }
}

fn rollback_outcome(rollback: &Option<Box<DbError>>) -> String {
    match rollback {
        Some(err) => format!(" (rollback also failed: {})", err),
        None => " (rolled back)".to_string(),
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        DbError::Database(Box::new(err))
    }
}

#[cfg(feature = "mysql")]
impl From<mysql::Error> for DbError {
    fn from(err: mysql::Error) -> Self {
        DbError::Database(Box::new(err))
    }
}

/// Type alias for Result to use DbError as the error type.
pub type Result<T> = std::result::Result<T, DbError>;
