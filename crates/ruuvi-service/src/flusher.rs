//! Background flusher.
//!
//! Periodically drains the ingestion buffer into the store on the interval
//! from `[buffer] flush_interval_secs`. A failed cycle leaves the unflushed
//! readings buffered and the loop keeps going; the next tick retries them.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use crate::flush::{FlushError, flush};
use crate::state::AppState;

/// Flush the buffer into the store right now.
///
/// Shares the store lock with request handlers, so a manual flush and a
/// periodic one never interleave. The outcome is recorded in
/// [`FlusherState::stats`](crate::state::FlusherState).
pub async fn flush_now(state: &AppState) -> Result<usize, FlushError> {
    let result = {
        let store = state.store.lock().await;
        flush(&state.buffer, &*store)
    };

    let mut stats = state.flusher.stats.write().await;
    match &result {
        Ok(count) => stats.record_success(*count),
        Err(e) => stats.record_failure(e.flushed, e.to_string()),
    }

    result
}

/// Background task that flushes the buffer on a fixed interval.
pub struct Flusher {
    state: Arc<AppState>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Flusher {
    /// Create a new flusher.
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            handle: Mutex::new(None),
        }
    }

    /// Start the periodic task.
    ///
    /// Returns `false` without doing anything if it is already running.
    pub async fn start(&self) -> bool {
        let mut handle = self.handle.lock().await;
        if self.state.flusher.is_running() {
            return false;
        }

        let period = {
            let config = self.state.config.read().await;
            Duration::from_secs(config.buffer.flush_interval_secs)
        };

        self.state.flusher.reset_stop();
        let stop_rx = self.state.flusher.subscribe_stop();
        self.state.flusher.set_running(true);

        info!("Starting flusher (interval: {}s)", period.as_secs());
        let state = Arc::clone(&self.state);
        *handle = Some(tokio::spawn(run(state, period, stop_rx)));
        true
    }

    /// Stop the periodic task and wait for it to exit.
    ///
    /// A flush already in progress completes first. Buffered readings are
    /// left in place; call [`flush_now`] afterwards to drain them.
    pub async fn stop(&self) {
        self.state.flusher.signal_stop();
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            error!("Flusher task ended abnormally: {}", e);
        }
    }

    /// Check if the periodic task is running.
    pub fn is_running(&self) -> bool {
        self.state.flusher.is_running()
    }
}

async fn run(state: Arc<AppState>, period: Duration, mut stop_rx: watch::Receiver<bool>) {
    // First flush is one full period after start
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut consecutive_failures = 0u32;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
                continue;
            }
        }

        match flush_now(&state).await {
            Ok(count) => {
                if consecutive_failures > 0 {
                    info!("Flush recovered after {} failure(s)", consecutive_failures);
                }
                consecutive_failures = 0;
                if count > 0 {
                    debug!("Periodic flush stored {} reading(s)", count);
                }
            }
            Err(e) => {
                consecutive_failures += 1;
                if consecutive_failures <= 3 {
                    warn!("Periodic flush failed: {} (attempt {})", e, consecutive_failures);
                } else if consecutive_failures == 4 {
                    error!(
                        "Periodic flush failed {} times in a row, will keep retrying silently",
                        consecutive_failures
                    );
                }
            }
        }
    }

    info!("Flusher stopped");
}
