//! Short-term trend classification.
//!
//! A trend compares a device's latest stored reading against the stored
//! reading nearest to a fixed look-back point (30 minutes ago by default)
//! and classifies the difference per metric.
//!
//! | metric | significant | slight |
//! |---|---|---|
//! | temperature | 1.0 °C | 0.3 °C |
//! | humidity | 3.0 % | 1.0 % |
//!
//! Trends read from the store only; readings still in the ingestion buffer
//! are not considered.
//!
//! # Example
//!
//! ```
//! use ruuvi_service::trends::{TrendDirection, TrendEngine};
//! use ruuvi_store::Store;
//!
//! let store = Store::open_in_memory()?;
//! let engine = TrendEngine::default();
//!
//! // A device with no readings has no trend at all
//! let trend = engine.compute_trend(&store, "AA:BB:CC", 1_700_000_000_000)?;
//! assert!(trend.temperature.is_none());
//!
//! assert_eq!(engine.config().temperature.classify(1.2), TrendDirection::Rising);
//! # Ok::<(), ruuvi_store::Error>(())
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use ruuvi_store::{Store, StoredReading};
use ruuvi_types::normalize_device_id;

const MINUTE_MS: i64 = 60_000;

/// Qualitative direction of a metric over the look-back period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrendDirection {
    Rising,
    RisingSlightly,
    Stable,
    FallingSlightly,
    Falling,
}

/// Direction and raw difference for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricTrend {
    pub direction: TrendDirection,
    /// `current - reference`, in the metric's unit.
    pub delta: f64,
}

impl MetricTrend {
    /// The trend reported when there is no reference reading yet.
    pub const NO_HISTORY: MetricTrend = MetricTrend {
        direction: TrendDirection::Stable,
        delta: 0.0,
    };
}

/// Trend record for one device.
///
/// A metric is `None` when the device has no stored reading at all, or when
/// either side of the comparison lacks that value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceTrend {
    pub device_id: String,
    pub temperature: Option<MetricTrend>,
    pub humidity: Option<MetricTrend>,
}

/// Classification thresholds for one metric.
///
/// Both values are magnitudes; falling trends use their negatives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricThresholds {
    /// Smallest change classified as rising/falling.
    pub significant: f64,
    /// Smallest change classified as rising/falling slightly.
    pub slight: f64,
}

impl MetricThresholds {
    /// Classify a delta. Significant bounds are checked before slight ones.
    pub fn classify(&self, delta: f64) -> TrendDirection {
        if delta >= self.significant {
            TrendDirection::Rising
        } else if delta >= self.slight {
            TrendDirection::RisingSlightly
        } else if delta <= -self.significant {
            TrendDirection::Falling
        } else if delta <= -self.slight {
            TrendDirection::FallingSlightly
        } else {
            TrendDirection::Stable
        }
    }

    fn trend(&self, current: Option<f64>, reference: Option<f64>) -> Option<MetricTrend> {
        let delta = current? - reference?;
        Some(MetricTrend {
            direction: self.classify(delta),
            delta,
        })
    }
}

/// Trend computation settings (the `[trends]` config section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// How far back the reference reading is taken from.
    pub lookback_minutes: u32,
    /// Half-width of the search window around the look-back point.
    pub window_minutes: u32,
    /// Temperature thresholds in °C.
    pub temperature: MetricThresholds,
    /// Humidity thresholds in percentage points.
    pub humidity: MetricThresholds,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            lookback_minutes: 30,
            window_minutes: 5,
            temperature: MetricThresholds {
                significant: 1.0,
                slight: 0.3,
            },
            humidity: MetricThresholds {
                significant: 3.0,
                slight: 1.0,
            },
        }
    }
}

/// Computes trends from stored readings.
#[derive(Debug, Clone, Default)]
pub struct TrendEngine {
    config: TrendConfig,
}

impl TrendEngine {
    /// Create an engine with the given settings.
    pub fn new(config: TrendConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &TrendConfig {
        &self.config
    }

    /// Compute the trend for one device as of `now_ms`.
    ///
    /// The reference is the reading closest to `now - lookback` within
    /// `± window` (inclusive). Among equally close readings the earliest one
    /// wins. With no reading in that window both metrics are reported as
    /// [`MetricTrend::NO_HISTORY`].
    pub fn compute_trend(
        &self,
        store: &Store,
        device_id: &str,
        now_ms: i64,
    ) -> ruuvi_store::Result<DeviceTrend> {
        let device_id = normalize_device_id(device_id);

        let Some(current) = store.get_latest_reading(&device_id)? else {
            return Ok(DeviceTrend {
                device_id,
                temperature: None,
                humidity: None,
            });
        };

        let target = now_ms - i64::from(self.config.lookback_minutes) * MINUTE_MS;
        let window = i64::from(self.config.window_minutes) * MINUTE_MS;
        let candidates = store.get_readings(&device_id, target - window, target + window)?;

        let Some(reference) = nearest(&candidates, target) else {
            debug!("No reference reading for {} near {}", device_id, target);
            return Ok(DeviceTrend {
                device_id,
                temperature: Some(MetricTrend::NO_HISTORY),
                humidity: Some(MetricTrend::NO_HISTORY),
            });
        };

        Ok(DeviceTrend {
            temperature: self
                .config
                .temperature
                .trend(current.temperature, reference.temperature),
            humidity: self
                .config
                .humidity
                .trend(current.humidity, reference.humidity),
            device_id,
        })
    }

    /// Compute trends for several devices, one record per id in request order.
    ///
    /// Devices are evaluated independently.
    pub fn compute_trends<S: AsRef<str>>(
        &self,
        store: &Store,
        device_ids: &[S],
        now_ms: i64,
    ) -> ruuvi_store::Result<Vec<DeviceTrend>> {
        device_ids
            .iter()
            .map(|id| self.compute_trend(store, id.as_ref(), now_ms))
            .collect()
    }
}

/// Reading closest to `target`; ties go to the first in ascending order.
fn nearest(candidates: &[StoredReading], target: i64) -> Option<&StoredReading> {
    candidates
        .iter()
        .min_by_key(|reading| reading.timestamp.abs_diff(target))
}
