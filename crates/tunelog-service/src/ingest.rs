//! Write path: decode a submitted reading, record it, persist it.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, error, warn};

use tunelog_store::{DurableLog, PersistenceError, ReadingStore};
use tunelog_types::{DEFAULT_STATUS, Reading, wall_clock_now};

use crate::snapshot::SnapshotEntry;
use crate::state::IngestStats;

/// Why a submission was not accepted.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The body is not well-formed JSON.
    #[error("Invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    /// Anything else that went wrong while accepting, including JSON that
    /// cannot become a reading.
    #[error("Unexpected ingest failure: {0}")]
    Unexpected(String),
}

/// Decoded submission before it is stamped with a time.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingPayload {
    pub frequency: f64,
    pub status: String,
}

impl ReadingPayload {
    /// Decode a raw request body.
    ///
    /// A missing or `null` frequency becomes `0.0`, and numeric strings are
    /// accepted. A missing, `null` or empty status becomes `"Unknown"`; numbers
    /// and booleans are stored in their JSON text form.
    ///
    /// # Errors
    ///
    /// [`IngestError::Decode`] when the body is not JSON and
    /// [`IngestError::Unexpected`] when it is not an object or a field cannot
    /// be converted.
    pub fn decode(payload: &[u8]) -> Result<Self, IngestError> {
        let value: Value = serde_json::from_slice(payload)?;
        let Value::Object(fields) = value else {
            return Err(IngestError::Unexpected(
                "expected a JSON object".to_string(),
            ));
        };

        let frequency = match fields.get("frequency") {
            None | Some(Value::Null) => 0.0,
            Some(Value::Number(n)) => n.as_f64().ok_or_else(|| {
                IngestError::Unexpected(format!("frequency {n} is out of range"))
            })?,
            Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| {
                IngestError::Unexpected(format!("frequency {s:?} is not a number"))
            })?,
            Some(other) => {
                return Err(IngestError::Unexpected(format!(
                    "frequency must be a number, got {other}"
                )));
            }
        };
        if !frequency.is_finite() {
            return Err(IngestError::Unexpected(format!(
                "frequency {frequency} is not finite"
            )));
        }

        let status = match fields.get("status") {
            None | Some(Value::Null) => DEFAULT_STATUS.to_string(),
            Some(Value::String(s)) if s.is_empty() => DEFAULT_STATUS.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(scalar @ (Value::Number(_) | Value::Bool(_))) => scalar.to_string(),
            Some(other) => {
                return Err(IngestError::Unexpected(format!(
                    "status must be a string, got {other}"
                )));
            }
        };

        Ok(Self { frequency, status })
    }
}

/// Outcome of a successful accept.
#[derive(Debug)]
pub struct Accepted {
    /// The reading as stored.
    pub reading: Reading,
    /// Set when one or more log sinks did not store the row.
    pub persistence_error: Option<PersistenceError>,
}

/// The only writer of the reading history and the durable log.
pub struct IngestGateway {
    store: Arc<ReadingStore>,
    log: Arc<DurableLog>,
    guard: Arc<Mutex<()>>,
    stats: Arc<IngestStats>,
    events: broadcast::Sender<SnapshotEntry>,
}

impl IngestGateway {
    pub fn new(
        store: Arc<ReadingStore>,
        log: Arc<DurableLog>,
        events: broadcast::Sender<SnapshotEntry>,
    ) -> Self {
        Self {
            store,
            log,
            guard: Arc::new(Mutex::new(())),
            stats: Arc::new(IngestStats::new()),
            events,
        }
    }

    /// Accept one raw submission.
    ///
    /// The reading is pushed to the history first, then appended to every log
    /// sink. A persistence failure is logged, counted and returned in
    /// [`Accepted::persistence_error`]; it does not fail the accept.
    ///
    /// Accepts are serialized, so history order and log order always match.
    /// Once decoded, a reading is recorded on its own task: dropping the
    /// returned future does not stop the append, the accounting or the
    /// broadcast.
    ///
    /// # Errors
    ///
    /// Decode failures leave all state untouched.
    pub async fn accept(&self, payload: &[u8]) -> Result<Accepted, IngestError> {
        let payload = match ReadingPayload::decode(payload) {
            Ok(payload) => payload,
            Err(e) => {
                self.stats.record_rejected();
                warn!("Rejected reading: {}", e);
                return Err(e);
            }
        };

        let task = tokio::spawn(record(
            Arc::clone(&self.guard),
            Arc::clone(&self.store),
            Arc::clone(&self.log),
            Arc::clone(&self.stats),
            self.events.clone(),
            payload,
        ));

        task.await.map_err(|e| {
            error!("Ingest task failed: {}", e);
            IngestError::Unexpected(format!("ingest task failed: {e}"))
        })?
    }

    /// Subscribe to accepted readings.
    pub fn subscribe(&self) -> broadcast::Receiver<SnapshotEntry> {
        self.events.subscribe()
    }

    /// Ingest counters.
    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }
}

/// Stamp, store, persist and publish one decoded reading.
async fn record(
    guard: Arc<Mutex<()>>,
    store: Arc<ReadingStore>,
    log: Arc<DurableLog>,
    stats: Arc<IngestStats>,
    events: broadcast::Sender<SnapshotEntry>,
    payload: ReadingPayload,
) -> Result<Accepted, IngestError> {
    let _guard = guard.lock_owned().await;

    let reading = Reading::new(wall_clock_now(), payload.frequency, payload.status);
    store.push(reading.clone());
    stats.record_accepted();

    let row = reading.clone();
    let persisted = tokio::task::spawn_blocking(move || log.append(&row))
        .await
        .map_err(|e| {
            error!("Log writer task failed: {}", e);
            IngestError::Unexpected(format!("log writer task failed: {e}"))
        })?;

    let persistence_error = match persisted {
        Ok(()) => None,
        Err(e) => {
            stats.record_persistence_failure(&e);
            Some(e)
        }
    };

    debug!(
        "Accepted reading {} Hz ({}) at {}",
        reading.frequency,
        reading.status,
        reading.timestamp_string()
    );

    // No subscribers is fine.
    let _ = events.send(SnapshotEntry::from(&reading));

    Ok(Accepted {
        reading,
        persistence_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex as StdMutex;

    use tunelog_store::{Error, Sink};

    /// Sink that records rows in a shared vector.
    struct RecordingSink {
        rows: Arc<StdMutex<Vec<Reading>>>,
        path: PathBuf,
    }

    impl Sink for RecordingSink {
        fn name(&self) -> &'static str {
            "memory"
        }

        fn path(&self) -> &Path {
            &self.path
        }

        fn append(&mut self, reading: &Reading) -> tunelog_store::Result<()> {
            self.rows.lock().unwrap().push(reading.clone());
            Ok(())
        }
    }

    /// Sink that always fails.
    struct BrokenSink;

    impl Sink for BrokenSink {
        fn name(&self) -> &'static str {
            "workbook"
        }

        fn path(&self) -> &Path {
            Path::new("broken.xlsx")
        }

        fn append(&mut self, _reading: &Reading) -> tunelog_store::Result<()> {
            Err(Error::Io(std::io::Error::other("read-only file system")))
        }
    }

    /// Sink that blocks for `delay` before answering.
    struct SlowSink {
        delay: std::time::Duration,
        fail: bool,
    }

    impl Sink for SlowSink {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn path(&self) -> &Path {
            Path::new("slow.csv")
        }

        fn append(&mut self, _reading: &Reading) -> tunelog_store::Result<()> {
            std::thread::sleep(self.delay);
            if self.fail {
                Err(Error::Io(std::io::Error::other("disk full")))
            } else {
                Ok(())
            }
        }
    }

    struct Harness {
        gateway: IngestGateway,
        store: Arc<ReadingStore>,
        rows: Arc<StdMutex<Vec<Reading>>>,
    }

    fn harness(capacity: usize, broken: bool) -> Harness {
        let extra: Vec<Box<dyn Sink>> = if broken {
            vec![Box::new(BrokenSink)]
        } else {
            Vec::new()
        };
        harness_with(capacity, extra)
    }

    fn harness_with(capacity: usize, extra: Vec<Box<dyn Sink>>) -> Harness {
        let rows = Arc::new(StdMutex::new(Vec::new()));
        let mut sinks: Vec<Box<dyn Sink>> = vec![Box::new(RecordingSink {
            rows: Arc::clone(&rows),
            path: PathBuf::from("memory.csv"),
        })];
        sinks.extend(extra);

        let store = Arc::new(ReadingStore::new(capacity));
        let (events, _) = broadcast::channel(16);
        let gateway = IngestGateway::new(
            Arc::clone(&store),
            Arc::new(DurableLog::with_sinks(sinks)),
            events,
        );
        Harness {
            gateway,
            store,
            rows,
        }
    }

    #[test]
    fn test_decode_full_payload() {
        let payload = ReadingPayload::decode(br#"{"frequency": 82.41, "status": "In Tune"}"#).unwrap();
        assert_eq!(payload.frequency, 82.41);
        assert_eq!(payload.status, "In Tune");
    }

    #[test]
    fn test_decode_defaults() {
        let payload = ReadingPayload::decode(br#"{}"#).unwrap();
        assert_eq!(payload.frequency, 0.0);
        assert_eq!(payload.status, "Unknown");

        let payload = ReadingPayload::decode(br#"{"frequency": null, "status": ""}"#).unwrap();
        assert_eq!(payload.frequency, 0.0);
        assert_eq!(payload.status, "Unknown");
    }

    #[test]
    fn test_decode_numeric_string_frequency() {
        let payload = ReadingPayload::decode(br#"{"frequency": " 110.5 "}"#).unwrap();
        assert_eq!(payload.frequency, 110.5);
    }

    #[test]
    fn test_decode_not_json() {
        let err = ReadingPayload::decode(b"not json").unwrap_err();
        assert!(matches!(err, IngestError::Decode(_)));
    }

    #[test]
    fn test_decode_wrong_shapes() {
        for body in [
            r#"[1, 2]"#,
            r#"{"frequency": "sharp"}"#,
            r#"{"frequency": "NaN"}"#,
            r#"{"frequency": true}"#,
            r#"{"frequency": 82.4, "status": ["In Tune"]}"#,
        ] {
            let err = ReadingPayload::decode(body.as_bytes()).unwrap_err();
            assert!(matches!(err, IngestError::Unexpected(_)), "{body}");
        }
    }

    #[test]
    fn test_decode_scalar_status_as_text() {
        let payload = ReadingPayload::decode(br#"{"frequency": 82.4, "status": 3}"#).unwrap();
        assert_eq!(payload.status, "3");

        let payload = ReadingPayload::decode(br#"{"status": true}"#).unwrap();
        assert_eq!(payload.status, "true");
    }

    #[tokio::test]
    async fn test_accept_updates_store_and_log() {
        let h = harness(10, false);
        let accepted = h
            .gateway
            .accept(br#"{"frequency": 82.4, "status": "In Tune"}"#)
            .await
            .unwrap();

        assert!(accepted.persistence_error.is_none());
        assert_eq!(h.store.latest(), Some(accepted.reading.clone()));
        assert_eq!(h.rows.lock().unwrap().as_slice(), &[accepted.reading]);
        assert_eq!(h.gateway.stats().accepted(), 1);
    }

    #[tokio::test]
    async fn test_accept_missing_status_is_unknown() {
        let h = harness(10, false);
        let accepted = h.gateway.accept(br#"{"frequency": 82.41}"#).await.unwrap();

        assert_eq!(accepted.reading.status, "Unknown");
        assert_eq!(accepted.reading.status_value(), -1);
        assert_eq!(accepted.reading.timestamp.nanosecond(), 0);
    }

    #[tokio::test]
    async fn test_accept_not_json_mutates_nothing() {
        let h = harness(10, false);
        let err = h.gateway.accept(b"not json").await.unwrap_err();

        assert!(matches!(err, IngestError::Decode(_)));
        assert!(h.store.is_empty());
        assert!(h.rows.lock().unwrap().is_empty());
        assert_eq!(h.gateway.stats().rejected(), 1);
        assert_eq!(h.gateway.stats().accepted(), 0);
    }

    #[tokio::test]
    async fn test_partial_persistence_failure_is_not_fatal() {
        let h = harness(10, true);
        let accepted = h
            .gateway
            .accept(br#"{"frequency": 79.1, "status": "Too Low"}"#)
            .await
            .unwrap();

        let failure = accepted.persistence_error.expect("workbook failure reported");
        assert!(failure.failed("workbook"));
        assert!(!failure.failed("memory"));

        // Live view and the healthy sink both have the reading.
        assert_eq!(h.store.len(), 1);
        assert_eq!(h.rows.lock().unwrap().len(), 1);

        let health = h.gateway.stats().persistence();
        assert_eq!(health.failed_appends, 1);
        assert_eq!(health.failures_by_sink.get("workbook"), Some(&1));
    }

    #[tokio::test]
    async fn test_accept_broadcasts_entry() {
        let h = harness(10, false);
        let mut rx = h.gateway.subscribe();

        h.gateway
            .accept(br#"{"frequency": 83.0, "status": "Too High"}"#)
            .await
            .unwrap();

        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.frequency, 83.0);
        assert_eq!(entry.status_value, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_accepts_keep_store_and_log_in_order() {
        let h = Arc::new(harness(1000, false));

        let mut tasks = Vec::new();
        for producer in 0..4 {
            let h = Arc::clone(&h);
            tasks.push(tokio::spawn(async move {
                for i in 0..25 {
                    let body = format!(r#"{{"frequency": {}, "status": "In Tune"}}"#, producer * 100 + i);
                    h.gateway.accept(body.as_bytes()).await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let stored: Vec<f64> = h.store.all().iter().map(|r| r.frequency).collect();
        let logged: Vec<f64> = h.rows.lock().unwrap().iter().map(|r| r.frequency).collect();
        assert_eq!(stored.len(), 100);
        assert_eq!(stored, logged);
    }

    #[tokio::test]
    async fn test_dropped_accept_still_completes() {
        let h = harness_with(
            10,
            vec![Box::new(SlowSink {
                delay: std::time::Duration::from_millis(200),
                fail: true,
            })],
        );
        let mut rx = h.gateway.subscribe();

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            h.gateway.accept(br#"{"frequency": 82.4, "status": "In Tune"}"#),
        )
        .await;
        assert!(result.is_err(), "accept should still be writing");

        tokio::time::sleep(std::time::Duration::from_millis(400)).await;

        assert_eq!(h.store.len(), 1);
        assert_eq!(h.rows.lock().unwrap().len(), 1);
        assert_eq!(h.gateway.stats().accepted(), 1);

        let entry = rx.try_recv().expect("reading broadcast after caller went away");
        assert_eq!(entry.frequency, 82.4);

        let health = h.gateway.stats().persistence();
        assert_eq!(health.failed_appends, 1);
        assert_eq!(health.failures_by_sink.get("slow"), Some(&1));
    }
}
