//! HTTP ingest, live dashboard and durable logging for guitar tuner readings.
//!
//! This crate provides a service that:
//! - Accepts tuner readings as JSON over HTTP POST
//! - Keeps the most recent readings in a bounded in-memory history
//! - Appends every reading to a CSV log and an XLSX workbook
//! - Serves a live dashboard and a JSON snapshot of recent readings
//! - Streams accepted readings over WebSocket
//! - Periodically hands snapshots to a renderer for live plotting
//!
//! # HTTP Endpoints
//!
//! - `GET /` - Dashboard page (polls `/data` every second)
//! - `GET /data` - Latest reading and retained history, newest first
//! - `POST <any path>` - Submit a reading: `{"frequency": 82.41, "status": "In Tune"}`
//! - `GET /api/health` - Service health check
//! - `GET /api/status` - Ingest, persistence and refresh counters
//! - `WS /api/ws` - Real-time stream of accepted readings
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/tunelog/server.toml`:
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8000"
//!
//! [storage]
//! data_dir = "guitar_tuner_data"
//! csv_file = "tuning_data.csv"
//! workbook_file = "tuning_data.xlsx"
//!
//! [history]
//! max_points = 100
//!
//! [refresh]
//! enabled = true
//! interval_ms = 100
//! ```

pub mod api;
pub mod config;
pub mod dashboard;
pub mod ingest;
pub mod refresh;
pub mod snapshot;
pub mod state;
pub mod ws;

pub use config::{
    Config, ConfigError, HistoryConfig, RefreshConfig, ServerConfig, StorageConfig,
};
pub use ingest::{Accepted, IngestError, IngestGateway, ReadingPayload};
pub use refresh::{LogRenderer, RefreshLoop, Renderer};
pub use snapshot::{Snapshot, SnapshotEntry, SnapshotService};
pub use state::{AppState, IngestStats, PersistenceHealth, RefreshState};
