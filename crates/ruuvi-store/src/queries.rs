//! Query builder for stored readings.
//!
//! [`ReadingQuery`] follows the builder pattern for filtering and paginating
//! readings. Device identifiers are normalized when the query is built, so
//! callers may pass any casing.
//!
//! # Example
//!
//! ```
//! use ruuvi_store::{Store, ReadingQuery};
//!
//! let store = Store::open_in_memory()?;
//!
//! // Last hour of readings for one sensor, oldest first
//! let now_ms = 1_700_000_000_000;
//! let query = ReadingQuery::new()
//!     .device("AA:BB:CC:DD:EE:FF")
//!     .since(now_ms - 3_600_000)
//!     .until(now_ms)
//!     .oldest_first();
//!
//! let readings = store.query_readings(&query)?;
//! assert!(readings.is_empty());
//! # Ok::<(), ruuvi_store::Error>(())
//! ```

use ruuvi_types::normalize_device_id;

/// Fluent query builder for readings.
///
/// Use this to construct queries for [`Store::query_readings`](crate::Store::query_readings).
/// All filter methods are optional and can be chained in any order.
///
/// Both time bounds are inclusive. By default, queries return results
/// ordered by `timestamp` descending (newest first); rows with equal
/// timestamps are ordered by insertion.
#[derive(Debug, Default, Clone)]
pub struct ReadingQuery {
    /// Filter by normalized device ID.
    pub device_id: Option<String>,
    /// Include only readings at or after this time (ms).
    pub since: Option<i64>,
    /// Include only readings at or before this time (ms).
    pub until: Option<i64>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Order by timestamp descending (newest first).
    pub newest_first: bool,
}

impl ReadingQuery {
    /// Create a new query with default settings.
    ///
    /// Default behavior:
    /// - No device filter (all devices)
    /// - No time range filter
    /// - No limit (all matching records)
    /// - Ordered by newest first
    pub fn new() -> Self {
        Self {
            newest_first: true,
            ..Default::default()
        }
    }

    /// Filter by device ID.
    pub fn device(mut self, device_id: &str) -> Self {
        self.device_id = Some(normalize_device_id(device_id));
        self
    }

    /// Filter to readings stamped at or after `timestamp_ms`.
    pub fn since(mut self, timestamp_ms: i64) -> Self {
        self.since = Some(timestamp_ms);
        self
    }

    /// Filter to readings stamped at or before `timestamp_ms`.
    pub fn until(mut self, timestamp_ms: i64) -> Self {
        self.until = Some(timestamp_ms);
        self
    }

    /// Limit the maximum number of results returned.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Order results by oldest first (ascending by `timestamp`).
    pub fn oldest_first(mut self) -> Self {
        self.newest_first = false;
        self
    }

    /// Build the SQL WHERE clause and parameters.
    pub(crate) fn build_where(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref device_id) = self.device_id {
            conditions.push("device_id = ?");
            params.push(Box::new(device_id.clone()));
        }

        if let Some(since) = self.since {
            conditions.push("timestamp >= ?");
            params.push(Box::new(since));
        }

        if let Some(until) = self.until {
            conditions.push("timestamp <= ?");
            params.push(Box::new(until));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    /// Build the full SQL query.
    pub(crate) fn build_sql(&self) -> String {
        let (where_clause, _) = self.build_where();
        let order = if self.newest_first { "DESC" } else { "ASC" };

        let mut sql = format!(
            "SELECT id, device_id, timestamp, temperature, humidity, pressure, battery \
             FROM readings {} ORDER BY timestamp {}, id {}",
            where_clause, order, order
        );

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_query_new_defaults() {
        let query = ReadingQuery::new();
        assert!(query.device_id.is_none());
        assert!(query.since.is_none());
        assert!(query.until.is_none());
        assert!(query.limit.is_none());
        assert!(query.newest_first);
    }

    #[test]
    fn test_reading_query_default_is_different_from_new() {
        let default_query = ReadingQuery::default();
        let new_query = ReadingQuery::new();

        // Default doesn't set newest_first, but new() does
        assert!(!default_query.newest_first);
        assert!(new_query.newest_first);
    }

    #[test]
    fn test_reading_query_device_is_normalized() {
        let query = ReadingQuery::new().device("AA:BB:CC");
        assert_eq!(query.device_id, Some("aa:bb:cc".to_string()));
    }

    #[test]
    fn test_reading_query_chaining() {
        let query = ReadingQuery::new()
            .device("my-device")
            .since(1_000)
            .until(2_000)
            .limit(10)
            .oldest_first();

        assert_eq!(query.device_id, Some("my-device".to_string()));
        assert_eq!(query.since, Some(1_000));
        assert_eq!(query.until, Some(2_000));
        assert_eq!(query.limit, Some(10));
        assert!(!query.newest_first);
    }

    #[test]
    fn test_reading_query_build_where_empty() {
        let query = ReadingQuery::new();
        let (where_clause, params) = query.build_where();
        assert_eq!(where_clause, "");
        assert!(params.is_empty());
    }

    #[test]
    fn test_reading_query_build_where_time_range_is_inclusive() {
        let query = ReadingQuery::new().since(1_000).until(2_000);
        let (where_clause, params) = query.build_where();

        assert_eq!(where_clause, "WHERE timestamp >= ? AND timestamp <= ?");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_reading_query_build_where_all_filters() {
        let query = ReadingQuery::new().device("device-1").since(0).until(10);
        let (where_clause, params) = query.build_where();

        assert!(where_clause.contains("device_id = ?"));
        assert!(where_clause.contains("timestamp >= ?"));
        assert!(where_clause.contains("timestamp <= ?"));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_reading_query_build_sql_basic() {
        let sql = ReadingQuery::new().build_sql();

        assert!(sql.contains("FROM readings"));
        assert!(sql.contains("ORDER BY timestamp DESC, id DESC"));
        assert!(!sql.contains("WHERE"));
        assert!(!sql.contains("LIMIT"));
    }

    #[test]
    fn test_reading_query_build_sql_oldest_first() {
        let sql = ReadingQuery::new().oldest_first().build_sql();
        assert!(sql.contains("ORDER BY timestamp ASC, id ASC"));
    }

    #[test]
    fn test_reading_query_build_sql_limit() {
        let sql = ReadingQuery::new().limit(50).build_sql();
        assert!(sql.ends_with("LIMIT 50"));
    }

    #[test]
    fn test_reading_query_build_sql_selects_closed_schema() {
        let sql = ReadingQuery::new().build_sql();
        for column in [
            "id",
            "device_id",
            "timestamp",
            "temperature",
            "humidity",
            "pressure",
            "battery",
        ] {
            assert!(sql.contains(column), "missing column {}", column);
        }
    }
}
