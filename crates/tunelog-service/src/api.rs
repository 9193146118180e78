//! HTTP endpoints for the tuner service.
//!
//! # Routes
//!
//! - `GET /` serves the dashboard, `GET /data` the current snapshot.
//! - `POST` to any path that is not a GET-only API route submits a reading.
//! - `GET /api/health` and `GET /api/status` report on the service itself.
//!
//! ## Error Handling
//!
//! Ingest failures are answered with plain text: `400 Invalid JSON` for a
//! malformed body and `500 Server error` for anything else, including JSON
//! that cannot become a reading. Persistence failures are not errors for the
//! client; they show up in `/api/status`.
//!
//! # Example
//!
//! ```ignore
//! use tunelog_service::api;
//!
//! let app = api::router().with_state(state);
//! ```

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use time::OffsetDateTime;

use crate::dashboard::dashboard;
use crate::ingest::IngestError;
use crate::snapshot::Snapshot;
use crate::state::{AppState, PersistenceHealth};

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(dashboard).post(ingest))
        .route("/data", get(get_data).post(ingest))
        .route("/api/health", get(health))
        .route("/api/status", get(get_status))
        .fallback(fallback)
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// Latest reading and retained history, newest first.
async fn get_data(State(state): State<Arc<AppState>>) -> Json<Snapshot> {
    Json(state.snapshots.current_snapshot())
}

/// Body returned for an accepted reading.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
}

/// Submit a reading.
async fn ingest(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<IngestResponse>, IngestError> {
    state.gateway.accept(&body).await?;
    Ok(Json(IngestResponse {
        status: "Data received successfully",
    }))
}

/// POST anywhere ingests; every other unknown request is a 404.
async fn fallback(method: Method, state: State<Arc<AppState>>, body: Bytes) -> Response {
    if method == Method::POST {
        ingest(state, body).await.into_response()
    } else {
        (StatusCode::NOT_FOUND, "Not found").into_response()
    }
}

/// Service status.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub uptime_seconds: u64,
    pub ingest: IngestStatus,
    pub persistence: PersistenceHealth,
    pub history: HistoryStatus,
    pub refresh: RefreshStatus,
}

/// Ingest counters.
#[derive(Debug, Serialize)]
pub struct IngestStatus {
    pub accepted: u64,
    pub rejected: u64,
}

/// In-memory history occupancy.
#[derive(Debug, Serialize)]
pub struct HistoryStatus {
    pub retained: usize,
    pub capacity: usize,
}

/// Refresh loop status.
#[derive(Debug, Serialize)]
pub struct RefreshStatus {
    pub enabled: bool,
    pub running: bool,
    pub interval_ms: u64,
    pub ticks: u64,
    pub renders: u64,
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let stats = state.gateway.stats();

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
        uptime_seconds: state.uptime_seconds(),
        ingest: IngestStatus {
            accepted: stats.accepted(),
            rejected: stats.rejected(),
        },
        persistence: stats.persistence(),
        history: HistoryStatus {
            retained: state.snapshots.retained(),
            capacity: state.snapshots.capacity(),
        },
        refresh: RefreshStatus {
            enabled: state.config.refresh.enabled,
            running: state.refresh.is_running(),
            interval_ms: state.config.refresh.interval_ms,
            ticks: state.refresh.ticks(),
            renders: state.refresh.renders(),
        },
    })
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        // The gateway has already logged the cause.
        match self {
            IngestError::Decode(_) => (StatusCode::BAD_REQUEST, "Invalid JSON").into_response(),
            IngestError::Unexpected(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response()
            }
        }
    }
}
