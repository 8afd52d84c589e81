//! Main store implementation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;
use tracing::{debug, info};

use ruuvi_types::{Reading, normalize_device_id};

use crate::error::{Error, Result};
use crate::models::{StoredDevice, StoredReading};
use crate::queries::ReadingQuery;
use crate::schema;

/// Where a store keeps its data.
#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

/// SQLite-based store for sensor readings.
///
/// A file-backed store holds an exclusive lock on its database for as long
/// as it is open, so a second process (or a second `Store` in the same
/// process) cannot bind to the same file.
///
/// `Store` is `Send` but not `Sync`; share it behind a mutex.
pub struct Store {
    conn: Option<Connection>,
    location: Location,
}

impl Store {
    /// Open or create a database at the given path.
    ///
    /// Fails with [`Error::CreateDirectory`] or [`Error::Open`] when the
    /// location is unwritable or already locked.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = open_file(&path)?;
        Ok(Self {
            conn: Some(conn),
            location: Location::File(path),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Some(open_memory()?),
            location: Location::Memory,
        })
    }

    /// Close the store, releasing the database file and its lock.
    ///
    /// Every operation after this returns [`Error::Closed`] until
    /// [`reopen`](Self::reopen) is called. Closing a closed store is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            info!("Closing database {}", self.describe());
            conn.close().map_err(|(_, e)| Error::Database(e))?;
        }
        Ok(())
    }

    /// Bind the store to its original location again.
    ///
    /// An in-memory store comes back empty.
    pub fn reopen(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        let conn = match &self.location {
            Location::File(path) => open_file(path)?,
            Location::Memory => open_memory()?,
        };
        self.conn = Some(conn);
        Ok(())
    }

    /// Whether the store is currently bound to its database.
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Path of the backing file, or `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::Memory => None,
        }
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(Error::Closed)
    }

    fn describe(&self) -> String {
        match &self.location {
            Location::File(path) => path.display().to_string(),
            Location::Memory => ":memory:".to_string(),
        }
    }
}

fn open_file(path: &Path) -> Result<Connection> {
    // Create parent directories if needed
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    info!("Opening database at {}", path.display());
    let open_err = |source| Error::Open {
        path: path.to_path_buf(),
        source,
    };

    let conn = Connection::open(path).map_err(open_err)?;

    // Fail fast instead of waiting on another holder of the lock
    conn.busy_timeout(Duration::ZERO).map_err(open_err)?;

    // Take the exclusive lock before switching to WAL so it is held for the
    // lifetime of the connection.
    conn.execute_batch(
        "PRAGMA locking_mode = EXCLUSIVE;
         BEGIN EXCLUSIVE;
         COMMIT;
         PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )
    .map_err(open_err)?;

    schema::initialize(&conn).map_err(|e| match e {
        Error::Database(source) => open_err(source),
        other => other,
    })?;

    Ok(conn)
}

fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    schema::initialize(&conn)?;
    Ok(conn)
}

fn reading_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredReading> {
    Ok(StoredReading {
        id: row.get(0)?,
        device_id: row.get(1)?,
        timestamp: row.get(2)?,
        temperature: row.get(3)?,
        humidity: row.get(4)?,
        pressure: row.get(5)?,
        battery: row.get(6)?,
    })
}

// Reading operations
impl Store {
    /// Insert one reading for a device.
    ///
    /// Every call appends a row; repeated `(device_id, timestamp)` pairs are
    /// kept as distinct rows.
    pub fn insert_reading(&self, device_id: &str, reading: &Reading) -> Result<i64> {
        let conn = self.conn()?;
        let device_id = normalize_device_id(device_id);

        conn.execute(
            "INSERT INTO readings (device_id, timestamp, temperature, humidity, pressure, battery)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                device_id,
                reading.timestamp,
                reading.temperature,
                reading.humidity,
                reading.pressure,
                reading.battery,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Query readings with filters.
    pub fn query_readings(&self, query: &ReadingQuery) -> Result<Vec<StoredReading>> {
        let conn = self.conn()?;
        let sql = query.build_sql();
        let (_, params) = query.build_where();

        debug!("Executing query: {}", sql);

        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let readings = stmt
            .query_map(params_ref.as_slice(), reading_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(readings)
    }

    /// Get all readings for a device with `start_ms <= timestamp <= end_ms`.
    ///
    /// Results are ascending by timestamp. An unknown device, or an empty
    /// window, gives an empty vector.
    pub fn get_readings(
        &self,
        device_id: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<StoredReading>> {
        let query = ReadingQuery::new()
            .device(device_id)
            .since(start_ms)
            .until(end_ms)
            .oldest_first();
        self.query_readings(&query)
    }

    /// Get the latest reading for a device.
    ///
    /// When several rows share the newest timestamp, the last inserted wins.
    pub fn get_latest_reading(&self, device_id: &str) -> Result<Option<StoredReading>> {
        let query = ReadingQuery::new().device(device_id).limit(1);
        let mut readings = self.query_readings(&query)?;
        Ok(readings.pop())
    }

    /// Count readings, optionally for a single device.
    pub fn count_readings(&self, device_id: Option<&str>) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = match device_id {
            Some(id) => conn.query_row(
                "SELECT COUNT(*) FROM readings WHERE device_id = ?",
                [normalize_device_id(id)],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?,
        };

        Ok(count as u64)
    }

    /// List every device that has readings, most recently seen first.
    pub fn list_devices(&self) -> Result<Vec<StoredDevice>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT device_id, COUNT(*), MIN(timestamp), MAX(timestamp)
             FROM readings GROUP BY device_id ORDER BY MAX(timestamp) DESC, device_id ASC",
        )?;

        let devices = stmt
            .query_map([], |row| {
                Ok(StoredDevice {
                    id: row.get(0)?,
                    reading_count: row.get::<_, i64>(1)? as u64,
                    first_seen: row.get(2)?,
                    last_seen: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(devices)
    }
}
