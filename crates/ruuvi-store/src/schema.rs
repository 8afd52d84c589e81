//! Database schema and migrations.

use rusqlite::Connection;

use crate::error::{Error, Result};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema.
///
/// A database written by a newer release is refused with
/// [`Error::UnsupportedSchema`] rather than read with the wrong layout.
pub fn initialize(conn: &Connection) -> Result<()> {
    match get_schema_version(conn)? {
        0 => {
            // Fresh database - create all tables
            create_schema_v1(conn)?;
            set_schema_version(conn, SCHEMA_VERSION)?;
            Ok(())
        }
        SCHEMA_VERSION => Ok(()),
        found => Err(Error::UnsupportedSchema {
            found,
            supported: SCHEMA_VERSION,
        }),
    }
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 =
        conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0))?;

    Ok(version)
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?)",
        [version],
    )?;
    Ok(())
}

/// Create the initial schema (version 1).
///
/// Rows are not unique on `(device_id, timestamp)`: two readings with the
/// same stamp are two rows.
fn create_schema_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS readings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            temperature REAL,
            humidity REAL,
            pressure REAL,
            battery REAL
        );
        CREATE INDEX IF NOT EXISTS idx_readings_device_time
            ON readings(device_id, timestamp);
        "#,
    )?;

    Ok(())
}
