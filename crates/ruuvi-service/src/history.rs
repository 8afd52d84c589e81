//! Range-limited, downsampled history for charting.

use serde::{Deserialize, Serialize};

use ruuvi_store::{Store, StoredReading};
use ruuvi_types::TimeRange;

/// Upper bound on the number of points returned for one history query.
pub const MAX_POINTS: usize = 500;

/// A single chart point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
}

impl From<&StoredReading> for ChartPoint {
    fn from(reading: &StoredReading) -> Self {
        Self {
            timestamp: reading.timestamp,
            temperature: reading.temperature,
            humidity: reading.humidity,
            pressure: reading.pressure,
        }
    }
}

/// Reduce `points` to at most `max` entries by uniform stride.
///
/// With `n > max` points the stride is `ceil(n / max)` and every stride-th
/// point is kept, starting at the first. When `max >= 2` the last point is
/// kept too: it is appended when missing, or replaces the final sample when
/// there is no room left. Input order is preserved. A `max` of one yields
/// only the first point and a `max` of zero yields nothing.
pub fn downsample<T: Clone>(points: &[T], max: usize) -> Vec<T> {
    if max == 0 {
        return Vec::new();
    }
    if points.len() <= max {
        return points.to_vec();
    }
    if max == 1 {
        return points.first().cloned().into_iter().collect();
    }

    let stride = points.len().div_ceil(max);
    let mut sampled: Vec<T> = points.iter().step_by(stride).cloned().collect();

    let last_index = points.len() - 1;
    if last_index % stride != 0
        && let Some(last) = points.last()
    {
        if sampled.len() < max {
            sampled.push(last.clone());
        } else if let Some(tail) = sampled.last_mut() {
            *tail = last.clone();
        }
    }

    sampled
}

/// Stored history for a device over `range`, ending at `now_ms`.
///
/// Readings still in the ingestion buffer are not included. Results are in
/// ascending timestamp order and hold at most [`MAX_POINTS`] entries.
pub fn query_range(
    store: &Store,
    device_id: &str,
    range: TimeRange,
    now_ms: i64,
) -> ruuvi_store::Result<Vec<ChartPoint>> {
    let (start, end) = range.bounds(now_ms);
    let readings = store.get_readings(device_id, start, end)?;
    let points: Vec<ChartPoint> = readings.iter().map(ChartPoint::from).collect();
    Ok(downsample(&points, MAX_POINTS))
}
