//! Durable storage for RuuviTag sensor readings.
//!
//! This crate provides SQLite-based storage for readings flushed from the
//! in-memory ingestion buffer, indexed by device and timestamp for range
//! scans.
//!
//! # Features
//!
//! - Append-only readings table with a `(device_id, timestamp)` index
//! - Inclusive time-range reads, ascending by timestamp
//! - Latest-reading lookup per device
//! - Explicit open/close lifecycle with an exclusive file lock
//!
//! # Example
//!
//! ```
//! use ruuvi_store::Store;
//! use ruuvi_types::Reading;
//!
//! let store = Store::open_in_memory()?;
//!
//! let reading = Reading {
//!     timestamp: 1_700_000_000_000,
//!     temperature: Some(21.5),
//!     humidity: Some(45.0),
//!     pressure: Some(101_325.0),
//!     battery: Some(2.9),
//! };
//! store.insert_reading("AA:BB:CC:DD:EE:FF", &reading)?;
//!
//! let readings = store.get_readings("aa:bb:cc:dd:ee:ff", 0, 1_700_000_000_000)?;
//! assert_eq!(readings.len(), 1);
//! # Ok::<(), ruuvi_store::Error>(())
//! ```

mod error;
mod models;
mod queries;
mod schema;
mod store;

pub use error::{Error, Result};
pub use models::{StoredDevice, StoredReading};
pub use queries::ReadingQuery;
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/ruuvi/history.db`
/// - macOS: `~/Library/Application Support/ruuvi/history.db`
/// - Windows: `C:\Users\<user>\AppData\Local\ruuvi\history.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("ruuvi")
        .join("history.db")
}
