//! In-memory ingestion buffer.
//!
//! Sensor events arrive far more often than it is worth touching the
//! database. The [`IngestionBuffer`] accumulates them in arrival order until
//! the flusher drains them into the store.
//!
//! # Locking
//!
//! The buffer is guarded by a `std::sync::Mutex` that is held only for the
//! duration of a push, a swap, or a restore. It is never held across store
//! I/O or an `.await`, so it cannot deadlock against the store lock.
//!
//! Contents are volatile: whatever is still buffered when the process exits
//! is lost.

use std::sync::{Mutex, MutexGuard, PoisonError};

use ruuvi_types::{Reading, SensorData, normalize_device_id};

use crate::util::now_millis;

/// A reading waiting in the buffer, tagged with its device.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedReading {
    /// Normalized device identifier.
    pub device_id: String,
    /// The reading itself.
    pub reading: Reading,
}

#[derive(Debug, Default)]
struct BufferInner {
    readings: Vec<BufferedReading>,
    last_timestamp: i64,
}

/// Volatile, ordered accumulator of recently arrived readings.
///
/// Not deduplicated or keyed by device: every call to
/// [`add_reading`](Self::add_reading) appends one entry.
#[derive(Debug, Default)]
pub struct IngestionBuffer {
    inner: Mutex<BufferInner>,
}

impl IngestionBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BufferInner> {
        // A panic while holding the lock cannot leave the Vec half-updated.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a reading stamped with the current time.
    ///
    /// Returns the timestamp assigned to the reading.
    pub fn add_reading(&self, device_id: &str, data: &SensorData) -> i64 {
        self.add_reading_at(device_id, data, now_millis())
    }

    /// Append a reading stamped at `timestamp_ms`.
    ///
    /// Stamps never go backwards: a clock value older than the last stamp is
    /// raised to it. Returns the timestamp actually assigned.
    pub fn add_reading_at(&self, device_id: &str, data: &SensorData, timestamp_ms: i64) -> i64 {
        let device_id = normalize_device_id(device_id);
        let mut inner = self.lock();

        let timestamp = timestamp_ms.max(inner.last_timestamp);
        inner.last_timestamp = timestamp;
        inner.readings.push(BufferedReading {
            device_id,
            reading: Reading::from_sensor_data(data, timestamp),
        });

        timestamp
    }

    /// Number of buffered readings.
    pub fn len(&self) -> usize {
        self.lock().readings.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().readings.is_empty()
    }

    /// Snapshot of the buffered readings in arrival order.
    pub fn contents(&self) -> Vec<BufferedReading> {
        self.lock().readings.clone()
    }

    /// Drop all buffered readings.
    pub fn clear(&self) {
        self.lock().readings.clear();
    }

    /// Swap the live readings for an empty vector and return them.
    ///
    /// Readings added after this call are kept for the next drain.
    pub fn take(&self) -> Vec<BufferedReading> {
        std::mem::take(&mut self.lock().readings)
    }

    /// Put readings back at the head of the buffer.
    ///
    /// Used when a flush fails part-way; restored readings keep their place
    /// ahead of anything that arrived since they were taken.
    pub fn restore(&self, mut readings: Vec<BufferedReading>) {
        if readings.is_empty() {
            return;
        }
        let mut inner = self.lock();
        readings.append(&mut inner.readings);
        inner.readings = readings;
    }
}
