//! Core types for RuuviTag sensor history.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Milliseconds in one hour.
pub const HOUR_MS: i64 = 60 * 60 * 1000;

/// Milliseconds in one day.
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// Normalize a device identifier for use as a key.
///
/// Identifiers are case-insensitive; every layer that stores or looks up
/// readings keys them by the lowercase form. Surrounding whitespace is
/// trimmed so that `"AA:BB:CC "` from a comma-separated list matches.
///
/// # Examples
///
/// ```
/// use ruuvi_types::normalize_device_id;
///
/// assert_eq!(normalize_device_id("AA:BB:CC"), "aa:bb:cc");
/// assert_eq!(normalize_device_id(&normalize_device_id("Aa:Bb")), "aa:bb");
/// ```
#[must_use]
pub fn normalize_device_id(device_id: &str) -> String {
    device_id.trim().to_lowercase()
}

/// Sensor payload as delivered by the transport layer.
///
/// Only the four values the history pipeline keeps are modeled. Any other
/// field on the inbound event (`rssi`, `acceleration`, `data_format`,
/// `movement_counter`, ...) is dropped during deserialization.
///
/// Values are passed through without range checks; a missing value stays
/// `None` all the way to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorData {
    /// Temperature in degrees Celsius.
    #[cfg_attr(feature = "serde", serde(default))]
    pub temperature: Option<f64>,
    /// Relative humidity percentage.
    #[cfg_attr(feature = "serde", serde(default))]
    pub humidity: Option<f64>,
    /// Atmospheric pressure in pascals.
    #[cfg_attr(feature = "serde", serde(default))]
    pub pressure: Option<f64>,
    /// Battery voltage in volts.
    #[cfg_attr(feature = "serde", serde(default))]
    pub battery: Option<f64>,
}

impl SensorData {
    /// Create a payload with all four values present.
    pub fn new(temperature: f64, humidity: f64, pressure: f64, battery: f64) -> Self {
        Self {
            temperature: Some(temperature),
            humidity: Some(humidity),
            pressure: Some(pressure),
            battery: Some(battery),
        }
    }
}

/// One timestamped sample for a device.
///
/// The timestamp is assigned when the reading is ingested, not by the sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reading {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Temperature in degrees Celsius.
    pub temperature: Option<f64>,
    /// Relative humidity percentage.
    pub humidity: Option<f64>,
    /// Atmospheric pressure in pascals.
    pub pressure: Option<f64>,
    /// Battery voltage in volts.
    pub battery: Option<f64>,
}

impl Reading {
    /// Build a reading from an inbound payload stamped at `timestamp`.
    pub fn from_sensor_data(data: &SensorData, timestamp: i64) -> Self {
        Self {
            timestamp,
            temperature: data.temperature,
            humidity: data.humidity,
            pressure: data.pressure,
            battery: data.battery,
        }
    }
}

/// Lookback window for history queries.
///
/// The token forms (`1h`, `6h`, `24h`, `7d`, `30d`, `all`) are what the HTTP
/// layer receives as the `range` query parameter. Parsing is case-sensitive.
///
/// # Examples
///
/// ```
/// use ruuvi_types::{TimeRange, HOUR_MS};
///
/// let range: TimeRange = "6h".parse().unwrap();
/// assert_eq!(range, TimeRange::SixHours);
/// assert_eq!(range.bounds(10 * HOUR_MS), (4 * HOUR_MS, 10 * HOUR_MS));
///
/// assert_eq!(TimeRange::All.bounds(10 * HOUR_MS), (0, 10 * HOUR_MS));
/// assert!("2w".parse::<TimeRange>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TimeRange {
    /// The last hour.
    #[cfg_attr(feature = "serde", serde(rename = "1h"))]
    OneHour,
    /// The last six hours.
    #[cfg_attr(feature = "serde", serde(rename = "6h"))]
    SixHours,
    /// The last day.
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "24h"))]
    Day,
    /// The last seven days.
    #[cfg_attr(feature = "serde", serde(rename = "7d"))]
    Week,
    /// The last thirty days.
    #[cfg_attr(feature = "serde", serde(rename = "30d"))]
    Month,
    /// Everything ever stored.
    #[cfg_attr(feature = "serde", serde(rename = "all"))]
    All,
}

impl TimeRange {
    /// All supported ranges, shortest first.
    pub const ALL: [TimeRange; 6] = [
        TimeRange::OneHour,
        TimeRange::SixHours,
        TimeRange::Day,
        TimeRange::Week,
        TimeRange::Month,
        TimeRange::All,
    ];

    /// Length of the window in milliseconds, or `None` for [`TimeRange::All`].
    #[must_use]
    pub fn window_ms(&self) -> Option<i64> {
        match self {
            TimeRange::OneHour => Some(HOUR_MS),
            TimeRange::SixHours => Some(6 * HOUR_MS),
            TimeRange::Day => Some(DAY_MS),
            TimeRange::Week => Some(7 * DAY_MS),
            TimeRange::Month => Some(30 * DAY_MS),
            TimeRange::All => None,
        }
    }

    /// Resolve the range into `(start_ms, end_ms)` ending at `now_ms`.
    ///
    /// The start never goes below zero.
    #[must_use]
    pub fn bounds(&self, now_ms: i64) -> (i64, i64) {
        let start = match self.window_ms() {
            Some(window) => now_ms.saturating_sub(window).max(0),
            None => 0,
        };
        (start, now_ms)
    }

    /// The token form of this range.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::OneHour => "1h",
            TimeRange::SixHours => "6h",
            TimeRange::Day => "24h",
            TimeRange::Week => "7d",
            TimeRange::Month => "30d",
            TimeRange::All => "all",
        }
    }
}

impl FromStr for TimeRange {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1h" => Ok(TimeRange::OneHour),
            "6h" => Ok(TimeRange::SixHours),
            "24h" => Ok(TimeRange::Day),
            "7d" => Ok(TimeRange::Week),
            "30d" => Ok(TimeRange::Month),
            "all" => Ok(TimeRange::All),
            other => Err(ParseError::InvalidRange(other.to_string())),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
