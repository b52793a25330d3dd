//! Fixed-capacity history of readings.
//!
//! An index-addressed ring: a slot array allocated once at construction, a
//! write cursor and a saturating count. Appending is O(1) and, once the ring
//! is full, overwrites exactly the oldest reading.
//!
//! # Layout
//! ```text
//! capacity = 4, after appending r1..r6:
//!
//!   slot:   0    1    2    3
//!          [r5] [r6] [r3] [r4]
//!                     ^ cursor (next write, also the oldest survivor)
//!   count = 4
//!   newest-first walk: r6 r5 r4 r3
//! ```
//!
//! [`HistoryRing`] is the single-threaded structure. [`HistoryStore`] wraps it
//! in a `parking_lot::RwLock` so the recorder can append while query handlers
//! take snapshots: a snapshot is taken under the read lock, so it never sees a
//! half-written reading or a cursor that disagrees with the count.

use parking_lot::RwLock;

use crate::error::{AppResult, DaqError};
use crate::measurement_types::Reading;

/// Ring buffer of readings, newest overwrites oldest
#[derive(Debug, Clone)]
pub struct HistoryRing {
    slots: Box<[Option<Reading>]>,
    /// Slot the next append writes to
    cursor: usize,
    count: usize,
}

impl HistoryRing {
    /// Create an empty ring holding up to `capacity` readings
    pub fn new(capacity: usize) -> AppResult<Self> {
        if capacity == 0 {
            return Err(DaqError::Configuration(
                "history capacity must be greater than 0".into(),
            ));
        }
        Ok(Self {
            slots: vec![None; capacity].into_boxed_slice(),
            cursor: 0,
            count: 0,
        })
    }

    /// Maximum number of readings kept
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of readings currently held
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether nothing has been appended yet
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Store a reading, returning the one it evicted (if the ring was full)
    pub fn append(&mut self, reading: Reading) -> Option<Reading> {
        let capacity = self.capacity();
        let evicted = self.slots[self.cursor].replace(reading);
        self.cursor = (self.cursor + 1) % capacity;
        if self.count < capacity {
            self.count += 1;
        }
        evicted
    }

    /// The most recently appended reading
    pub fn latest(&self) -> Option<&Reading> {
        if self.count == 0 {
            return None;
        }
        self.slots[self.newest_index()].as_ref()
    }

    /// Readings from newest to oldest
    pub fn iter_newest_first(&self) -> impl Iterator<Item = &Reading> + '_ {
        let capacity = self.capacity();
        let newest = self.newest_index();
        (0..self.count).filter_map(move |i| self.slots[(newest + capacity - i) % capacity].as_ref())
    }

    /// Copy of the held readings, newest first
    pub fn snapshot_newest_first(&self) -> Vec<Reading> {
        self.iter_newest_first().cloned().collect()
    }

    fn newest_index(&self) -> usize {
        (self.cursor + self.capacity() - 1) % self.capacity()
    }
}

/// Thread-safe history shared by the recorder and the query service
#[derive(Debug)]
pub struct HistoryStore {
    ring: RwLock<HistoryRing>,
}

impl HistoryStore {
    /// Create an empty store holding up to `capacity` readings
    pub fn new(capacity: usize) -> AppResult<Self> {
        Ok(Self {
            ring: RwLock::new(HistoryRing::new(capacity)?),
        })
    }

    /// Append a reading (the only mutation), returning the evicted one
    pub fn append(&self, reading: Reading) -> Option<Reading> {
        self.ring.write().append(reading)
    }

    /// Consistent copy of the held readings, newest first
    pub fn snapshot_newest_first(&self) -> Vec<Reading> {
        self.ring.read().snapshot_newest_first()
    }

    /// The most recently appended reading
    pub fn latest(&self) -> Option<Reading> {
        self.ring.read().latest().cloned()
    }

    /// Number of readings currently held
    pub fn len(&self) -> usize {
        self.ring.read().len()
    }

    /// Whether nothing has been appended yet
    pub fn is_empty(&self) -> bool {
        self.ring.read().is_empty()
    }

    /// Maximum number of readings kept
    pub fn capacity(&self) -> usize {
        self.ring.read().capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement_types::SensorStatus;
    use chrono::{Duration, Local, TimeZone};

    fn reading(raw: u64) -> Reading {
        let base = Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Reading::new(
            base + Duration::seconds(raw as i64),
            raw,
            SensorStatus::Operational,
            10,
        )
    }

    fn raws(readings: &[Reading]) -> Vec<u64> {
        readings.iter().map(|r| r.raw_ticks).collect()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(HistoryRing::new(0).is_err());
        assert!(HistoryStore::new(0).is_err());
    }

    #[test]
    fn test_empty_snapshot() {
        let ring = HistoryRing::new(3).unwrap();
        assert!(ring.is_empty());
        assert!(ring.latest().is_none());
        assert!(ring.snapshot_newest_first().is_empty());
    }

    #[test]
    fn test_partial_fill_newest_first() {
        let mut ring = HistoryRing::new(5).unwrap();
        for raw in [1, 2, 3] {
            assert!(ring.append(reading(raw)).is_none());
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(raws(&ring.snapshot_newest_first()), vec![3, 2, 1]);
    }

    #[test]
    fn test_wraparound_evicts_oldest() {
        let mut ring = HistoryRing::new(3).unwrap();
        for raw in [10, 20, 30] {
            ring.append(reading(raw));
        }
        let evicted = ring.append(reading(40));

        assert_eq!(evicted.map(|r| r.raw_ticks), Some(10));
        assert_eq!(ring.len(), 3);
        assert_eq!(raws(&ring.snapshot_newest_first()), vec![40, 30, 20]);
        assert_eq!(ring.latest().map(|r| r.raw_ticks), Some(40));
    }

    #[test]
    fn test_many_wraps() {
        let mut ring = HistoryRing::new(4).unwrap();
        for raw in 1..=103 {
            ring.append(reading(raw));
        }
        assert_eq!(raws(&ring.snapshot_newest_first()), vec![103, 102, 101, 100]);
    }

    #[test]
    fn test_capacity_one() {
        let mut ring = HistoryRing::new(1).unwrap();
        ring.append(reading(1));
        assert_eq!(ring.append(reading(2)).map(|r| r.raw_ticks), Some(1));
        assert_eq!(raws(&ring.snapshot_newest_first()), vec![2]);
    }

    #[test]
    fn test_store_snapshot_is_repeatable() {
        let store = HistoryStore::new(3).unwrap();
        store.append(reading(7));
        store.append(reading(8));
        assert_eq!(store.snapshot_newest_first(), store.snapshot_newest_first());
        assert_eq!(store.len(), 2);
        assert_eq!(store.capacity(), 3);
    }
}
