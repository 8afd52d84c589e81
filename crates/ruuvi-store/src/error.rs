//! Error types for ruuvi-store.

use std::path::PathBuf;

/// Result type for ruuvi-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ruuvi-store.
///
/// `Open`, `CreateDirectory` and `UnsupportedSchema` are raised only while
/// binding a store to its backing file. `Closed` is returned by every operation after
/// [`Store::close`](crate::Store::close). `Database` covers I/O failures on
/// an open store; nothing here is retried or repaired automatically.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to open the database (unwritable location, locked by another
    /// process, or not a database).
    #[error("Failed to open database {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The database was written with a schema this build does not know.
    #[error("Unsupported schema version {found} (this build supports {supported})")]
    UnsupportedSchema { found: i32, supported: i32 },

    /// The store has been closed.
    #[error("Store is closed")]
    Closed,

    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl Error {
    /// Whether this error happened while opening the store.
    pub fn is_open_error(&self) -> bool {
        matches!(
            self,
            Error::Open { .. } | Error::CreateDirectory { .. } | Error::UnsupportedSchema { .. }
        )
    }
}
