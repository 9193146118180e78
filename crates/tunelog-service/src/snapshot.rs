//! Read-side view of the reading history.

use std::sync::Arc;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use tunelog_store::ReadingStore;
use tunelog_types::Reading;

/// One reading as presented to dashboards and plots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotEntry {
    /// `YYYY-MM-DD HH:MM:SS`
    pub timestamp: String,
    pub frequency: f64,
    pub status: String,
    /// Chart ordinal of `status`, -1 when unrecognized.
    pub status_value: i8,
}

impl From<&Reading> for SnapshotEntry {
    fn from(reading: &Reading) -> Self {
        Self {
            timestamp: reading.timestamp_string(),
            frequency: reading.frequency,
            status: reading.status.clone(),
            status_value: reading.status_value(),
        }
    }
}

/// Point-in-time copy of the latest reading and the retained history.
///
/// Serializes as `{"current": {...} | {}, "history": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    #[serde(serialize_with = "serialize_current")]
    pub current: Option<SnapshotEntry>,
    /// Newest first.
    pub history: Vec<SnapshotEntry>,
}

fn serialize_current<S: Serializer>(
    current: &Option<SnapshotEntry>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match current {
        Some(entry) => entry.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

/// Builds snapshots from a shared [`ReadingStore`] without mutating it.
#[derive(Debug, Clone)]
pub struct SnapshotService {
    store: Arc<ReadingStore>,
}

impl SnapshotService {
    /// Create a service reading from `store`.
    pub fn new(store: Arc<ReadingStore>) -> Self {
        Self { store }
    }

    /// Number of readings currently retained.
    pub fn retained(&self) -> usize {
        self.store.len()
    }

    /// Capacity of the underlying history.
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Take a consistent snapshot.
    ///
    /// `current` and `history` come from a single copy of the store, so the
    /// latest reading is always `history[0]`.
    pub fn current_snapshot(&self) -> Snapshot {
        let readings = self.store.all();
        let history: Vec<SnapshotEntry> = readings.iter().rev().map(SnapshotEntry::from).collect();

        Snapshot {
            current: history.first().cloned(),
            history,
        }
    }
}
