//! Application state shared across handlers.
//!
//! # Broadcast Channel Behavior
//!
//! Every accepted reading is published on a broadcast channel for WebSocket
//! clients. The buffer size comes from `server.broadcast_buffer` (default: 100).
//! A subscriber that falls behind loses the oldest entries; ingest never
//! blocks on slow clients.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::{broadcast, watch};

use tunelog_store::{DurableLog, PersistenceError, ReadingStore};

use crate::config::Config;
use crate::ingest::IngestGateway;
use crate::snapshot::SnapshotService;

/// Shared application state.
pub struct AppState {
    /// Configuration the service was started with.
    pub config: Config,
    /// Write path for incoming readings.
    pub gateway: IngestGateway,
    /// Read path for dashboards and the refresh loop.
    pub snapshots: SnapshotService,
    /// Refresh loop control state.
    pub refresh: Arc<RefreshState>,
    /// When the service state was created.
    pub started_at: OffsetDateTime,
}

impl AppState {
    /// Create new application state over an initialized store and log.
    pub fn new(store: ReadingStore, log: DurableLog, config: Config) -> Arc<Self> {
        let store = Arc::new(store);
        let (events, _) = broadcast::channel(config.server.broadcast_buffer.max(1));

        Arc::new(Self {
            gateway: IngestGateway::new(Arc::clone(&store), Arc::new(log), events),
            snapshots: SnapshotService::new(store),
            refresh: Arc::new(RefreshState::new()),
            started_at: OffsetDateTime::now_utc(),
            config,
        })
    }

    /// Seconds since the state was created.
    pub fn uptime_seconds(&self) -> u64 {
        (OffsetDateTime::now_utc() - self.started_at)
            .whole_seconds()
            .max(0) as u64
    }
}

/// Counters for the ingest path.
#[derive(Debug, Default)]
pub struct IngestStats {
    accepted: AtomicU64,
    rejected: AtomicU64,
    persistence: Mutex<PersistenceHealth>,
}

/// Durable log failures observed since startup.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PersistenceHealth {
    /// Readings that were not written to every sink.
    pub failed_appends: u64,
    /// Failure count per sink name.
    pub failures_by_sink: BTreeMap<String, u64>,
    /// Most recent failure message.
    pub last_error: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_error_at: Option<OffsetDateTime>,
}

impl IngestStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a reading that did not reach every sink.
    pub fn record_persistence_failure(&self, error: &PersistenceError) {
        let mut health = self
            .persistence
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        health.failed_appends += 1;
        for failure in &error.failures {
            *health
                .failures_by_sink
                .entry(failure.sink.to_string())
                .or_default() += 1;
        }
        health.last_error = Some(error.to_string());
        health.last_error_at = Some(OffsetDateTime::now_utc());
    }

    /// Readings accepted into the history.
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Submissions rejected before touching any state.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Copy of the persistence health counters.
    pub fn persistence(&self) -> PersistenceHealth {
        self.persistence
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// State for tracking and controlling the refresh loop.
pub struct RefreshState {
    running: AtomicBool,
    ticks: AtomicU64,
    renders: AtomicU64,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

impl RefreshState {
    pub fn new() -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            running: AtomicBool::new(false),
            ticks: AtomicU64::new(0),
            renders: AtomicU64::new(0),
            stop_tx,
            stop_rx,
        }
    }

    /// Check if the refresh loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    /// Ticks elapsed since the loop started.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Ticks that handed a snapshot to the renderer.
    pub fn renders(&self) -> u64 {
        self.renders.load(Ordering::Relaxed)
    }

    pub(crate) fn record_tick(&self, rendered: bool) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        if rendered {
            self.renders.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get a receiver for the stop signal.
    pub fn subscribe_stop(&self) -> watch::Receiver<bool> {
        self.stop_rx.clone()
    }

    /// Signal the refresh loop to stop.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(true);
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Default for RefreshState {
    fn default() -> Self {
        Self::new()
    }
}
