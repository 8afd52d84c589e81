//! Shared types for RuuviTag environmental sensor history.
//!
//! This crate provides the data model used by both the persistent store
//! (ruuvi-store) and the ingestion/query service (ruuvi-service).
//!
//! # Features
//!
//! - Inbound sensor payloads with unknown fields dropped
//! - Timestamped readings with a closed five-field schema
//! - Device identifier normalization
//! - Range tokens for history queries
//!
//! # Example
//!
//! ```
//! use ruuvi_types::{normalize_device_id, Reading, SensorData, TimeRange};
//!
//! let data = SensorData::new(21.5, 45.0, 101_325.0, 2.9);
//! let reading = Reading::from_sensor_data(&data, 1_700_000_000_000);
//! assert_eq!(reading.temperature, Some(21.5));
//!
//! assert_eq!(normalize_device_id("AA:BB:CC"), "aa:bb:cc");
//! assert_eq!(TimeRange::default(), TimeRange::Day);
//! ```

pub mod error;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{DAY_MS, HOUR_MS, Reading, SensorData, TimeRange, normalize_device_id};


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Normalizing twice gives the same result as normalizing once.
        #[test]
        fn normalize_is_idempotent(id in "[ -~]{0,32}") {
            let once = normalize_device_id(&id);
            prop_assert_eq!(normalize_device_id(&once), once);
        }

        /// Identifiers differing only in ASCII case normalize identically.
        #[test]
        fn normalize_is_case_insensitive(id in "[0-9A-Fa-f:]{1,17}") {
            prop_assert_eq!(
                normalize_device_id(&id.to_uppercase()),
                normalize_device_id(&id.to_lowercase())
            );
        }

        /// Range bounds never start before the epoch and always end at `now`.
        #[test]
        fn range_bounds_are_ordered(now in 0i64..=i64::MAX / 2) {
            for range in TimeRange::ALL {
                let (start, end) = range.bounds(now);
                prop_assert!(start >= 0);
                prop_assert!(start <= end);
                prop_assert_eq!(end, now);
            }
        }
    }
}
