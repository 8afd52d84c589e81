//! Buffered ingestion, history and trend queries for RuuviTag sensors.
//!
//! This crate provides a service that:
//! - Accepts batches of sensor readings over HTTP and buffers them in memory
//! - Flushes the buffer into the local database on a fixed interval
//! - Serves downsampled history for charting
//! - Classifies short-term temperature and humidity trends
//!
//! # REST API Endpoints
//!
//! - `GET /api/health` - Service health check
//! - `GET /api/status` - Buffer size and flusher statistics
//! - `POST /api/ruuvi` - Ingest `{deviceId: sensorData}` batches
//! - `POST /api/flush` - Flush the buffer now
//! - `GET /api/devices` - Devices with stored readings
//! - `GET /api/history/{device_id}?range=24h` - Chart points for a time range
//! - `GET /api/trends?devices=a,b` - Trends for the listed devices
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/ruuvi/server.toml`:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:3001"
//!
//! [storage]
//! path = "~/.local/share/ruuvi/history.db"
//!
//! [buffer]
//! flush_interval_secs = 60
//!
//! [trends]
//! lookback_minutes = 30
//! window_minutes = 5
//! ```

pub mod api;
pub mod buffer;
pub mod config;
pub mod flush;
pub mod flusher;
pub mod history;
pub mod state;
pub mod trends;
mod util;

pub use buffer::{BufferedReading, IngestionBuffer};
pub use config::{BufferConfig, Config, ConfigError, ServerConfig, StorageConfig};
pub use flush::{FlushError, ReadingSink, flush};
pub use flusher::{Flusher, flush_now};
pub use history::{ChartPoint, MAX_POINTS, downsample, query_range};
pub use state::{AppState, FlushStats, FlusherState};
pub use trends::{DeviceTrend, MetricTrend, TrendConfig, TrendDirection, TrendEngine};
pub use util::now_millis;
