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

use std::{borrow::Cow, fmt::Debug, iter::FusedIterator, sync::Arc, vec::IntoIter};

use ephemera_common::{
    error::{Error, Result},
    metrics::Metrics,
    record::EventRecord,
    strict_assert_eq,
};
use parking_lot::Mutex;

use crate::store::{EphemeralStore, RingConfig, Snapshot};

struct LockedRing {
    slots: Vec<Option<Arc<EventRecord>>>,
    cursor: usize,
    len: usize,
}

/// A fixed-capacity ring of ephemeral records guarded by a single mutex.
///
/// The lock is held for the duration of a put, or for the duration of copying the occupied slots out for a
/// snapshot. It is never held while the caller processes the records. Snapshots are strictly consistent, at the
/// cost of writer throughput under contention.
pub struct LockedRingStore {
    inner: Mutex<LockedRing>,
    capacity: usize,

    name: Cow<'static, str>,
    metrics: Arc<Metrics>,
}

impl Debug for LockedRingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockedRingStore")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl LockedRingStore {
    /// Create a locked ring store with the given capacity and noop metrics.
    ///
    /// Returns a config error if the capacity is 0.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_config(RingConfig::new(capacity))
    }

    /// Create a locked ring store with the given config.
    pub fn with_config(config: RingConfig) -> Result<Self> {
        config.validate()?;

        tracing::info!(
            name = %config.name,
            capacity = config.capacity,
            "[ring]: locked ring store created"
        );

        Ok(Self {
            inner: Mutex::new(LockedRing {
                slots: vec![None; config.capacity],
                cursor: 0,
                len: 0,
            }),
            capacity: config.capacity,
            name: config.name,
            metrics: config.metrics,
        })
    }

    /// The slot the next put writes to.
    pub fn cursor(&self) -> usize {
        self.inner.lock().cursor
    }
}

impl EphemeralStore for LockedRingStore {
    type Snapshot<'a> = LockedSnapshot;

    #[cfg_attr(feature = "tracing", fastrace::trace(name = "ephemera::memory::locked::put"))]
    fn put(&self, record: impl Into<Arc<EventRecord>>) -> Result<()> {
        let record = record.into();
        if record.is_absent() {
            self.metrics.put_invalid.increase(1);
            return Err(Error::absent_record().with_context("name", &self.name));
        }

        let old = {
            let mut ring = self.inner.lock();
            let cursor = ring.cursor;
            let old = ring.slots[cursor].replace(record);
            ring.cursor = (cursor + 1) % self.capacity;
            if ring.len < self.capacity {
                ring.len += 1;
            }
            old
        };

        self.metrics.put.increase(1);
        match old {
            Some(_) => self.metrics.evict.increase(1),
            None => self.metrics.usage.increase(1),
        }

        Ok(())
    }

    fn snapshot(&self) -> LockedSnapshot {
        let records = {
            let ring = self.inner.lock();
            let tail = if ring.len == self.capacity { ring.cursor } else { 0 };
            let records = (0..ring.len)
                .filter_map(|offset| ring.slots[(tail + offset) % self.capacity].clone())
                .collect::<Vec<_>>();
            strict_assert_eq!(records.len(), ring.len);
            records
        };
        let observed = records.len();
        LockedSnapshot {
            records: records.into_iter(),
            observed,
        }
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.inner.lock().len
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

/// Snapshot of a [`LockedRingStore`], copied out under the lock.
#[derive(Debug)]
pub struct LockedSnapshot {
    records: IntoIter<Arc<EventRecord>>,
    observed: usize,
}

impl Iterator for LockedSnapshot {
    type Item = Arc<EventRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.records.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}

impl ExactSizeIterator for LockedSnapshot {}

impl FusedIterator for LockedSnapshot {}

impl Snapshot for LockedSnapshot {
    fn observed(&self) -> usize {
        self.observed
    }
}
