use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::trace;

use super::record::{CollectionId, CollectionRecord};
use crate::session::{CollectionStart, CollectionStop};

/// Default number of collections kept.
pub const DEFAULT_CAPACITY: usize = 10;

#[derive(Debug, Default)]
struct Inner {
    order: VecDeque<CollectionId>,
    records: HashMap<CollectionId, CollectionRecord>,
}

/// Bounded, insertion-ordered record of recent collections.
///
/// Single writer (the collections listener), any number of readers. Writers
/// hold the lock only for a map insert and a few deque pops, so readers
/// polling at frame rate never wait noticeably. A capacity of `0` disables
/// eviction.
#[derive(Debug)]
pub struct CollectionHistory {
    inner: RwLock<Inner>,
    capacity: AtomicUsize,
}

impl Default for CollectionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl CollectionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            capacity: AtomicUsize::new(capacity),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Applies on the next insert; shrinking does not trim existing entries.
    pub fn set_capacity(&self, capacity: usize) {
        self.capacity.store(capacity, Ordering::Relaxed);
    }

    /// Inserts a record and evicts the oldest entries beyond capacity.
    ///
    /// A record whose id is already present replaces the stored one in
    /// place and keeps its original position. Returns the evicted ids,
    /// oldest first.
    pub fn insert(&self, record: CollectionRecord) -> Vec<CollectionId> {
        let capacity = self.capacity();
        let mut inner = self.write();

        let id = record.id;
        if inner.records.insert(id, record).is_none() {
            inner.order.push_back(id);
        }

        let mut evicted = Vec::new();
        if capacity > 0 {
            while inner.order.len() > capacity {
                let Some(oldest) = inner.order.pop_front() else {
                    break;
                };
                inner.records.remove(&oldest);
                evicted.push(oldest);
            }
        }
        evicted
    }

    /// Fills in the end time of a held record. Returns `false` for an id
    /// that was never seen or has been evicted.
    pub fn complete(&self, id: CollectionId, end_time_relative: f64) -> bool {
        match self.write().records.get_mut(&id) {
            Some(record) => {
                record.end_time_relative = end_time_relative;
                true
            }
            None => false,
        }
    }

    pub fn record_start(&self, start: CollectionStart) {
        let record = CollectionRecord {
            id: start.id,
            timestamp: start.timestamp,
            reason: start.reason,
            generation: start.depth,
            kind: start.kind,
            start_time_relative: start.timestamp_relative_ms,
            end_time_relative: 0.0,
        };
        let evicted = self.insert(record);
        trace!(id = %start.id, generation = start.depth, reason = %start.reason, evicted = evicted.len(), "collection started");
    }

    pub fn record_stop(&self, stop: CollectionStop) {
        if self.complete(stop.id, stop.timestamp_relative_ms) {
            trace!(id = %stop.id, "collection finished");
        } else {
            trace!(id = %stop.id, "stop for unknown or evicted collection ignored");
        }
    }

    /// Records oldest first.
    pub fn snapshot(&self) -> Vec<CollectionRecord> {
        let inner = self.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id).cloned())
            .collect()
    }

    pub fn get(&self, id: CollectionId) -> Option<CollectionRecord> {
        self.read().records.get(&id).cloned()
    }

    /// Most recently started collection.
    pub fn latest(&self) -> Option<CollectionRecord> {
        let inner = self.read();
        inner.order.back().and_then(|id| inner.records.get(id).cloned())
    }

    pub fn len(&self) -> usize {
        self.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
