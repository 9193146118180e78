//! Bounded in-memory history of recent readings.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tunelog_types::Reading;

/// Default number of readings retained in memory.
pub const DEFAULT_MAX_POINTS: usize = 100;

/// Fixed-capacity sliding window of readings, oldest first.
///
/// Every operation takes the same mutex for an O(1) or O(n) copy, so readers
/// never observe a half-applied push or eviction.
#[derive(Debug)]
pub struct ReadingStore {
    capacity: usize,
    readings: Mutex<VecDeque<Reading>>,
}

impl Default for ReadingStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POINTS)
    }
}

impl ReadingStore {
    /// Create an empty store. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            readings: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Maximum number of readings retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a reading, evicting the oldest one when full.
    pub fn push(&self, reading: Reading) {
        let mut readings = self.lock();
        readings.push_back(reading);
        while readings.len() > self.capacity {
            readings.pop_front();
        }
    }

    /// The most recently pushed reading.
    pub fn latest(&self) -> Option<Reading> {
        self.lock().back().cloned()
    }

    /// Copy of every retained reading, oldest first.
    pub fn all(&self) -> Vec<Reading> {
        self.lock().iter().cloned().collect()
    }

    /// Number of retained readings.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no reading has been retained yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave the deque half-updated.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Reading>> {
        self.readings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use time::PrimitiveDateTime;
    use time::macros::datetime;

    fn reading_at(second: u8, frequency: f64, status: &str) -> Reading {
        let ts: PrimitiveDateTime = datetime!(2024-05-01 10:00:00);
        Reading::new(
            ts.replace_second(second).unwrap(),
            frequency,
            status.to_string(),
        )
    }

    #[test]
    fn test_empty_store() {
        let store = ReadingStore::new(3);
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert!(store.latest().is_none());
        assert!(store.all().is_empty());
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let store = ReadingStore::new(0);
        assert_eq!(store.capacity(), 1);

        store.push(reading_at(1, 80.0, "Too Low"));
        store.push(reading_at(2, 82.4, "In Tune"));
        assert_eq!(store.all(), vec![reading_at(2, 82.4, "In Tune")]);
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(ReadingStore::default().capacity(), DEFAULT_MAX_POINTS);
    }

    #[test]
    fn test_eviction_keeps_last_two() {
        let store = ReadingStore::new(2);
        let t1 = reading_at(1, 82.4, "In Tune");
        let t2 = reading_at(2, 79.1, "Too Low");
        let t3 = reading_at(3, 83.0, "Too High");

        store.push(t1);
        store.push(t2.clone());
        store.push(t3.clone());

        assert_eq!(store.all(), vec![t2, t3.clone()]);
        assert_eq!(store.latest(), Some(t3));
    }

    #[test]
    fn test_all_is_a_snapshot() {
        let store = ReadingStore::new(2);
        store.push(reading_at(1, 82.4, "In Tune"));
        let before = store.all();

        store.push(reading_at(2, 79.1, "Too Low"));
        store.push(reading_at(3, 83.0, "Too High"));

        assert_eq!(before, vec![reading_at(1, 82.4, "In Tune")]);
    }

    #[test]
    fn test_concurrent_push_and_read() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 500;
        const CAPACITY: usize = 50;

        let store = Arc::new(ReadingStore::new(CAPACITY));

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for seq in 0..PER_PRODUCER {
                        // Encode producer and sequence so order can be checked.
                        let frequency = (p * 1_000_000 + seq) as f64;
                        store.push(reading_at(0, frequency, "In Tune"));
                    }
                })
            })
            .collect();

        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..500 {
                    let snapshot = store.all();
                    assert!(snapshot.len() <= CAPACITY);

                    let mut last_seen: Vec<Option<usize>> = vec![None; PRODUCERS];
                    for reading in &snapshot {
                        let encoded = reading.frequency as usize;
                        let (p, seq) = (encoded / 1_000_000, encoded % 1_000_000);
                        if let Some(prev) = last_seen[p] {
                            // Per producer, the window holds consecutive sequence numbers.
                            assert_eq!(seq, prev + 1);
                        }
                        last_seen[p] = Some(seq);
                    }
                }
            })
        };

        for handle in producers {
            handle.join().unwrap();
        }
        reader.join().unwrap();

        assert_eq!(store.len(), CAPACITY);
        assert_eq!(store.latest().as_ref(), store.all().last());
    }
}
