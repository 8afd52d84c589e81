//! Draining the ingestion buffer into durable storage.
//!
//! [`flush`] swaps the buffer's live readings for an empty vector under the
//! buffer lock, releases the lock, then inserts the swapped-out readings one
//! by one. Readings that arrive while the inserts run land in the fresh
//! vector and wait for the next cycle, so nothing is dropped or written
//! twice across a flush boundary.
//!
//! Inserts are not rolled back. If the sink fails part-way, the readings it
//! already accepted stay stored and the rest go back to the head of the
//! buffer.

use tracing::{debug, warn};

use ruuvi_store::Store;
use ruuvi_types::Reading;

use crate::buffer::IngestionBuffer;

/// Destination for flushed readings.
///
/// [`Store`] is the production sink; tests substitute sinks that fail on
/// demand.
pub trait ReadingSink {
    /// Durably record one reading for a device.
    fn insert_reading(&self, device_id: &str, reading: &Reading) -> ruuvi_store::Result<i64>;
}

impl ReadingSink for Store {
    fn insert_reading(&self, device_id: &str, reading: &Reading) -> ruuvi_store::Result<i64> {
        Store::insert_reading(self, device_id, reading)
    }
}

/// A flush that stopped at a failed insert.
#[derive(Debug, thiserror::Error)]
#[error("Flush stopped after {flushed} reading(s); {unflushed} returned to buffer: {source}")]
pub struct FlushError {
    /// Readings inserted before the failure.
    pub flushed: usize,
    /// Readings put back into the buffer.
    pub unflushed: usize,
    /// The store failure.
    pub source: ruuvi_store::Error,
}

/// Drain the buffer into `sink`, returning how many readings were stored.
///
/// The count is the number of readings present when the snapshot was taken.
/// On failure, see [`FlushError`] for how many made it.
pub fn flush<S>(buffer: &IngestionBuffer, sink: &S) -> Result<usize, FlushError>
where
    S: ReadingSink + ?Sized,
{
    let mut snapshot = buffer.take();
    if snapshot.is_empty() {
        return Ok(0);
    }

    let failure = snapshot.iter().enumerate().find_map(|(index, item)| {
        sink.insert_reading(&item.device_id, &item.reading)
            .err()
            .map(|e| (index, e))
    });

    match failure {
        None => {
            debug!("Flushed {} reading(s)", snapshot.len());
            Ok(snapshot.len())
        }
        Some((flushed, source)) => {
            let unflushed = snapshot.split_off(flushed);
            let count = unflushed.len();
            buffer.restore(unflushed);
            warn!(
                "Flush failed after {} reading(s), {} kept in buffer: {}",
                flushed, count, source
            );
            Err(FlushError {
                flushed,
                unflushed: count,
                source,
            })
        }
    }
}
