//! Data models for stored data.

use serde::{Deserialize, Serialize};

use ruuvi_types::Reading;

/// A reading stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReading {
    /// Database row ID.
    pub id: i64,
    /// Normalized device identifier.
    pub device_id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Temperature in Celsius.
    pub temperature: Option<f64>,
    /// Humidity percentage.
    pub humidity: Option<f64>,
    /// Pressure in pascals.
    pub pressure: Option<f64>,
    /// Battery voltage.
    pub battery: Option<f64>,
}

impl StoredReading {
    /// Convert to a Reading.
    pub fn to_reading(&self) -> Reading {
        Reading {
            timestamp: self.timestamp,
            temperature: self.temperature,
            humidity: self.humidity,
            pressure: self.pressure,
            battery: self.battery,
        }
    }
}

/// Summary of a device that has stored readings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDevice {
    /// Normalized device identifier.
    pub id: String,
    /// Number of stored readings.
    pub reading_count: u64,
    /// Timestamp of the oldest reading (ms).
    pub first_seen: i64,
    /// Timestamp of the newest reading (ms).
    pub last_seen: i64,
}
