// Copyright 2026 foyer Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    borrow::Cow,
    fmt::Debug,
    iter::FusedIterator,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use arc_swap::ArcSwapOption;
use ephemera_common::{
    error::{Error, Result},
    metrics::Metrics,
    record::EventRecord,
    strict_assert,
};

use crate::store::{EphemeralStore, RingConfig, Snapshot};

/// A slot entry, stamped with the write sequence that reserved it.
///
/// Besides the record's own `Arc`, the entry is the only allocation a put makes. A put handed an `Arc<EventRecord>`
/// shares it and never copies the record. The stamp and the record are swapped in together, so a delayed put is
/// always told apart from the one that lapped it.
struct Entry {
    sequence: u64,
    record: Arc<EventRecord>,
}

/// A lock-free, fixed-capacity ring of ephemeral records.
///
/// Every slot is an independently swappable [`ArcSwapOption`]. A put reserves its slot by advancing the write
/// sequence with a single `fetch_add`, then publishes the record into the slot. Two puts in flight reserve distinct
/// sequences. If they map to the same slot because the ring wrapped around meanwhile, the lower sequence never
/// replaces the higher one. A reader never observes a partially written record.
///
/// The write cursor and the occupancy are both derived from the write sequence, so a snapshot reads them with one
/// atomic load.
///
/// # Consistency
///
/// A snapshot racing with puts is weakly consistent. It yields only records whose put was reserved before the
/// snapshot was taken, in reservation order. A slot whose put is reserved but not yet completed, or that a later
/// put overwrites before the scan reaches it, is omitted. Records are never torn and every record is yielded at
/// most once.
pub struct RingStore {
    slots: Box<[ArcSwapOption<Entry>]>,
    /// Count of reserved writes since construction.
    sequence: AtomicU64,

    name: Cow<'static, str>,
    metrics: Arc<Metrics>,
}

impl Debug for RingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingStore")
            .field("name", &self.name)
            .field("capacity", &self.slots.len())
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish()
    }
}

impl RingStore {
    /// Create a ring store with the given capacity and noop metrics.
    ///
    /// Returns a config error if the capacity is 0.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_config(RingConfig::new(capacity))
    }

    /// Create a ring store with the given config.
    pub fn with_config(config: RingConfig) -> Result<Self> {
        config.validate()?;

        let slots = (0..config.capacity).map(|_| ArcSwapOption::empty()).collect();

        tracing::info!(
            name = %config.name,
            capacity = config.capacity,
            "[ring]: lock-free ring store created"
        );

        Ok(Self {
            slots,
            sequence: AtomicU64::new(0),
            name: config.name,
            metrics: config.metrics,
        })
    }

    /// The slot the next put writes to.
    pub fn cursor(&self) -> usize {
        self.position(self.sequence.load(Ordering::Acquire)).0
    }

    #[inline]
    fn capacity_u64(&self) -> u64 {
        self.slots.len() as u64
    }

    /// `(cursor, len)` for a write sequence.
    #[inline]
    fn position(&self, sequence: u64) -> (usize, usize) {
        let cursor = (sequence % self.capacity_u64()) as usize;
        let len = sequence.min(self.capacity_u64()) as usize;
        (cursor, len)
    }

    #[inline]
    fn reserve(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::AcqRel)
    }

    /// Publish the record of a reserved sequence, unless a higher sequence already owns the slot.
    fn publish(&self, sequence: u64, record: Arc<EventRecord>) {
        let (slot, _) = self.position(sequence);
        let entry = Arc::new(Entry { sequence, record });
        let old = self.slots[slot].rcu(|current| match current {
            Some(current) if current.sequence > sequence => Some(current.clone()),
            _ => Some(entry.clone()),
        });
        strict_assert!(old.as_ref().is_none_or(|old| old.sequence != sequence));
    }

    /// The first slot of a scan, which is the slot the next put overwrites once the ring is full.
    #[inline]
    fn tail(&self, cursor: usize, len: usize) -> usize {
        if len == self.slots.len() {
            cursor
        } else {
            0
        }
    }
}

impl EphemeralStore for RingStore {
    type Snapshot<'a> = RingSnapshot<'a>;

    #[cfg_attr(feature = "tracing", fastrace::trace(name = "ephemera::memory::ring::put"))]
    fn put(&self, record: impl Into<Arc<EventRecord>>) -> Result<()> {
        let record = record.into();
        if record.is_absent() {
            self.metrics.put_invalid.increase(1);
            return Err(Error::absent_record().with_context("name", &self.name));
        }

        let sequence = self.reserve();
        self.publish(sequence, record);

        self.metrics.put.increase(1);
        if sequence < self.capacity_u64() {
            self.metrics.usage.increase(1);
        } else {
            self.metrics.evict.increase(1);
        }

        Ok(())
    }

    fn snapshot(&self) -> RingSnapshot<'_> {
        let sequence = self.sequence.load(Ordering::Acquire);
        let (cursor, len) = self.position(sequence);
        RingSnapshot {
            slots: &self.slots,
            tail: self.tail(cursor, len),
            first: sequence - len as u64,
            offset: 0,
            len,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn len(&self) -> usize {
        self.position(self.sequence.load(Ordering::Acquire)).1
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

/// Snapshot of a [`RingStore`].
///
/// Slots are loaded lazily while iterating. A slot is yielded only if it still holds the record of the sequence the
/// snapshot expects there.
pub struct RingSnapshot<'a> {
    slots: &'a [ArcSwapOption<Entry>],
    tail: usize,
    /// Sequence of the oldest record in the snapshot.
    first: u64,
    offset: usize,
    len: usize,
}

impl Debug for RingSnapshot<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingSnapshot")
            .field("tail", &self.tail)
            .field("first", &self.first)
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}

impl Iterator for RingSnapshot<'_> {
    type Item = Arc<EventRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.offset < self.len {
            let slot = (self.tail + self.offset) % self.slots.len();
            let sequence = self.first + self.offset as u64;
            self.offset += 1;
            if let Some(entry) = &*self.slots[slot].load() {
                if entry.sequence == sequence {
                    return Some(entry.record.clone());
                }
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.len - self.offset))
    }
}

impl FusedIterator for RingSnapshot<'_> {}

impl Snapshot for RingSnapshot<'_> {
    fn observed(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Barrier, thread};

    use ephemera_common::error::ErrorKind;
    use itertools::Itertools;

    use super::*;
    use crate::test_utils::{ids, record};

    fn is_send_sync_static<T: Send + Sync + 'static>() {}

    #[test]
    fn test_send_sync_static() {
        is_send_sync_static::<RingStore>();
    }

    #[test]
    fn test_zero_capacity() {
        let err = RingStore::new(0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_absent_record() {
        let ring = RingStore::new(4).unwrap();
        let err = ring.put(EventRecord::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(ring.len(), 0);
        assert_eq!(ring.cursor(), 0);
        assert_eq!(ring.snapshot().count(), 0);
    }

    #[test]
    fn test_empty_snapshot() {
        let ring = RingStore::new(4).unwrap();
        let snapshot = ring.snapshot();
        assert_eq!(snapshot.observed(), 0);
        assert_eq!(snapshot.count(), 0);
    }

    #[test]
    fn test_partial_fill() {
        let ring = RingStore::new(5).unwrap();
        for i in 0..3 {
            ring.put(record(i, i as u32)).unwrap();
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.cursor(), 3);
        assert_eq!(ids(ring.snapshot()), vec!["id-0", "id-1", "id-2"]);
    }

    #[test]
    fn test_fifo_eviction() {
        let ring = RingStore::new(5).unwrap();
        for i in 0..5 {
            ring.put(record(i, 0)).unwrap();
        }
        assert_eq!(ids(ring.snapshot()), vec!["id-0", "id-1", "id-2", "id-3", "id-4"]);

        ring.put(record(5, 0)).unwrap();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.cursor(), 1);
        assert_eq!(ids(ring.snapshot()), vec!["id-1", "id-2", "id-3", "id-4", "id-5"]);
    }

    #[test]
    fn test_capacity_invariant() {
        const CAPACITY: usize = 7;
        for extra in 0..3 * CAPACITY {
            let ring = RingStore::new(CAPACITY).unwrap();
            let total = CAPACITY + extra;
            for i in 0..total {
                ring.put(record(i, 0)).unwrap();
            }
            let expected = (total - CAPACITY..total).map(|i| format!("id-{i}")).collect_vec();
            let snapshot = ring.snapshot();
            assert_eq!(snapshot.observed(), CAPACITY);
            assert_eq!(ids(snapshot), expected);
        }
    }

    #[test]
    fn test_capacity_one() {
        let ring = RingStore::new(1).unwrap();
        for i in 0..4 {
            ring.put(record(i, 0)).unwrap();
            assert_eq!(ids(ring.snapshot()), vec![format!("id-{i}")]);
        }
    }

    #[test]
    fn test_snapshot_idempotent() {
        let ring = RingStore::new(8).unwrap();
        for i in 0..13 {
            ring.put(record(i, 0)).unwrap();
        }
        let s1 = ring.snapshot().collect_vec();
        let s2 = ring.snapshot().collect_vec();
        assert_eq!(s1.len(), 8);
        assert!(s1.iter().zip(s2.iter()).all(|(a, b)| Arc::ptr_eq(a, b)));
    }

    #[test]
    fn test_snapshot_keeps_evicted_record_alive() {
        let ring = RingStore::new(2).unwrap();
        ring.put(record(0, 0)).unwrap();
        let held = ring.snapshot().next().unwrap();
        ring.put(record(1, 0)).unwrap();
        ring.put(record(2, 0)).unwrap();
        assert_eq!(held.id(), "id-0");
        assert_eq!(ids(ring.snapshot()), vec!["id-1", "id-2"]);
    }

    #[test]
    fn test_put_shares_record() {
        let ring = RingStore::new(2).unwrap();
        let shared = Arc::new(record(0, 0));
        ring.put(shared.clone()).unwrap();

        let stored = ring.snapshot().next().unwrap();
        assert!(Arc::ptr_eq(&stored, &shared));
        // Held by the caller, the slot entry and the snapshot item.
        assert_eq!(Arc::strong_count(&shared), 3);
    }

    #[test]
    fn test_reserved_slot_skipped() {
        let ring = RingStore::new(4).unwrap();
        ring.put(record(0, 0)).unwrap();
        let reserved = ring.reserve();
        ring.put(record(2, 0)).unwrap();

        let snapshot = ring.snapshot();
        assert_eq!(snapshot.observed(), 3);
        assert_eq!(ids(snapshot), vec!["id-0", "id-2"]);

        ring.publish(reserved, Arc::new(record(1, 0)));
        assert_eq!(ids(ring.snapshot()), vec!["id-0", "id-1", "id-2"]);
    }

    #[test]
    fn test_stale_write_never_replaces_newer() {
        let ring = RingStore::new(2).unwrap();
        let stale = ring.reserve();
        ring.put(record(1, 0)).unwrap();
        ring.put(record(2, 0)).unwrap();
        ring.publish(stale, Arc::new(record(0, 0)));

        assert_eq!(ids(ring.snapshot()), vec!["id-1", "id-2"]);
    }

    #[test]
    fn test_overwritten_during_scan() {
        let ring = RingStore::new(3).unwrap();
        for i in 0..3 {
            ring.put(record(i, 0)).unwrap();
        }
        let mut snapshot = ring.snapshot();
        assert_eq!(snapshot.next().unwrap().id(), "id-0");
        // Overwrite id-0 and id-1. The scan has not reached id-1 yet.
        ring.put(record(3, 0)).unwrap();
        ring.put(record(4, 0)).unwrap();
        assert_eq!(ids(snapshot), vec!["id-2"]);
    }

    #[test]
    fn test_concurrent_put() {
        const THREADS: usize = 8;
        const PUTS: usize = 1000;
        const CAPACITY: usize = 512;

        let ring = RingStore::new(CAPACITY).unwrap();
        let barrier = Barrier::new(THREADS);

        thread::scope(|s| {
            for t in 0..THREADS {
                let ring = &ring;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    for i in 0..PUTS {
                        ring.put(record(t * PUTS + i, t as u32)).unwrap();
                    }
                });
            }
        });

        assert_eq!(ring.len(), CAPACITY.min(THREADS * PUTS));
        let records = ring.snapshot().collect_vec();
        assert_eq!(records.len(), CAPACITY);
        assert_eq!(records.iter().map(|r| r.id()).unique().count(), CAPACITY);
    }
}
