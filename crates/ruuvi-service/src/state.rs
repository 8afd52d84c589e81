//! Application state shared across handlers and the flusher.
//!
//! # Locks
//!
//! - `buffer` uses a short-lived `std::sync::Mutex` internally and is safe to
//!   touch from any handler without awaiting.
//! - `store` is a `tokio::sync::Mutex`; only one task talks to SQLite at a
//!   time. The buffer lock is never taken while the store lock is held across
//!   I/O.
//! - `config` and `flusher.stats` are `RwLock`s read by status endpoints.
//!
//! Acquire in the order `config`, `store`, `flusher.stats` when more than one
//! is needed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use ruuvi_store::Store;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock, watch};

use crate::buffer::IngestionBuffer;
use crate::config::Config;
use crate::trends::TrendEngine;

/// Shared application state.
pub struct AppState {
    /// The durable store.
    pub store: Mutex<Store>,
    /// Readings waiting to be flushed.
    pub buffer: IngestionBuffer,
    /// Configuration.
    pub config: RwLock<Config>,
    /// Trend engine built from `config.trends` at startup.
    pub trends: TrendEngine,
    /// Flusher control state.
    pub flusher: FlusherState,
}

impl AppState {
    /// Create new application state around an open store.
    pub fn new(store: Store, config: Config) -> Arc<Self> {
        let trends = TrendEngine::new(config.trends.clone());
        Arc::new(Self {
            store: Mutex::new(store),
            buffer: IngestionBuffer::new(),
            config: RwLock::new(config),
            trends,
            flusher: FlusherState::new(),
        })
    }
}

/// State for tracking and controlling the periodic flusher.
pub struct FlusherState {
    running: AtomicBool,
    /// Unix seconds; zero when never started.
    started_at: AtomicU64,
    stop_tx: watch::Sender<bool>,
    /// Outcome counters for every flush, periodic or manual.
    pub stats: RwLock<FlushStats>,
}

impl FlusherState {
    /// Create a stopped flusher state.
    pub fn new() -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            running: AtomicBool::new(false),
            started_at: AtomicU64::new(0),
            stop_tx,
            stats: RwLock::new(FlushStats::default()),
        }
    }

    /// Check if the periodic task is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Mark the periodic task as started or stopped.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
        if running {
            let now = OffsetDateTime::now_utc().unix_timestamp() as u64;
            self.started_at.store(now, Ordering::SeqCst);
        }
    }

    /// When the periodic task was last started.
    pub fn started_at(&self) -> Option<OffsetDateTime> {
        match self.started_at.load(Ordering::SeqCst) {
            0 => None,
            ts => OffsetDateTime::from_unix_timestamp(ts as i64).ok(),
        }
    }

    /// Get a receiver for the stop signal.
    pub fn subscribe_stop(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    /// Signal the periodic task to stop.
    pub fn signal_stop(&self) {
        self.stop_tx.send_replace(true);
        self.running.store(false, Ordering::SeqCst);
    }

    /// Clear the stop signal before a restart.
    pub fn reset_stop(&self) {
        self.stop_tx.send_replace(false);
    }
}

impl Default for FlusherState {
    fn default() -> Self {
        Self::new()
    }
}

/// Cumulative flush outcomes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FlushStats {
    /// Time of the last flush that completed without error.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_flush_at: Option<OffsetDateTime>,
    /// Time of the last failed flush.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_error_at: Option<OffsetDateTime>,
    /// Last error message.
    pub last_error: Option<String>,
    /// Readings written to the store across all flushes.
    pub total_flushed: u64,
    /// Flushes that completed without error, including empty ones.
    pub flush_count: u64,
    /// Flushes that stopped at a store error.
    pub failure_count: u64,
}

impl FlushStats {
    /// Record a successful flush of `flushed` readings.
    pub fn record_success(&mut self, flushed: usize) {
        self.last_flush_at = Some(OffsetDateTime::now_utc());
        self.total_flushed += flushed as u64;
        self.flush_count += 1;
    }

    /// Record a failed flush that still stored `flushed` readings.
    pub fn record_failure(&mut self, flushed: usize, error: String) {
        self.last_error_at = Some(OffsetDateTime::now_utc());
        self.last_error = Some(error);
        self.total_flushed += flushed as u64;
        self.failure_count += 1;
    }
}
