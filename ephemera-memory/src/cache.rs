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

use std::{borrow::Cow, fmt::Debug, sync::Arc};

use ephemera_common::{
    error::Result,
    filter::Filter,
    metrics::{registry::noop::NoopMetricsRegistry, BoxedRegistry, Metrics},
    record::EventRecord,
};
use itertools::Itertools;
use tokio_util::sync::CancellationToken;

use crate::{
    locked::LockedRingStore,
    query::QueryExecutor,
    ring::RingStore,
    store::{EphemeralStore, RingConfig, DEFAULT_NAME},
};

/// Ring implementation used by an [`EphemeralCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RingStrategy {
    /// Lock-free ring with per-slot atomic swaps.
    ///
    /// Snapshots racing with puts are weakly consistent.
    #[default]
    LockFree,
    /// Ring guarded by a single mutex.
    ///
    /// Snapshots are strictly consistent, writers contend on the lock.
    Locked,
}

/// Ephemeral cache builder.
pub struct EphemeralCacheBuilder {
    name: Cow<'static, str>,
    capacity: usize,
    strategy: RingStrategy,
    registry: BoxedRegistry,
}

impl Debug for EphemeralCacheBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralCacheBuilder")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("strategy", &self.strategy)
            .finish()
    }
}

impl EphemeralCacheBuilder {
    /// Create an ephemeral cache builder with the given slot count.
    pub fn new(capacity: usize) -> Self {
        Self {
            name: DEFAULT_NAME.into(),
            capacity,
            strategy: RingStrategy::default(),
            registry: Box::new(NoopMetricsRegistry),
        }
    }

    /// Set the name of the cache. The name is used as the metrics label.
    ///
    /// Default: `ephemeral`.
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the ring implementation.
    ///
    /// Default: [`RingStrategy::LockFree`].
    pub fn with_strategy(mut self, strategy: RingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the metrics registry.
    ///
    /// Default: [`NoopMetricsRegistry`].
    pub fn with_metrics_registry(mut self, registry: BoxedRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Build the ephemeral cache with the given configuration.
    ///
    /// Returns a config error if the capacity is 0.
    pub fn build(self) -> Result<EphemeralCache> {
        let metrics = Arc::new(Metrics::new(self.name.clone(), &*self.registry));
        let config = RingConfig {
            name: self.name,
            capacity: self.capacity,
            metrics,
        };
        let cache = match self.strategy {
            RingStrategy::LockFree => EphemeralCache::LockFree(Arc::new(RingStore::with_config(config)?)),
            RingStrategy::Locked => EphemeralCache::Locked(Arc::new(LockedRingStore::with_config(config)?)),
        };
        Ok(cache)
    }
}

/// A fixed-capacity cache of ephemeral records, shared by producers and consumers.
///
/// Cloning the cache is cheap, all clones refer to the same ring.
#[derive(Clone)]
pub enum EphemeralCache {
    /// Cache backed by a [`RingStore`].
    LockFree(Arc<RingStore>),
    /// Cache backed by a [`LockedRingStore`].
    Locked(Arc<LockedRingStore>),
}

impl Debug for EphemeralCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LockFree(store) => f.debug_tuple("EphemeralCache::LockFree").field(store).finish(),
            Self::Locked(store) => f.debug_tuple("EphemeralCache::Locked").field(store).finish(),
        }
    }
}

impl EphemeralCache {
    /// Store a record, evicting the oldest one if the cache is full.
    pub fn put(&self, record: impl Into<Arc<EventRecord>>) -> Result<()> {
        match self {
            EphemeralCache::LockFree(store) => store.put(record),
            EphemeralCache::Locked(store) => store.put(record),
        }
    }

    /// Collect a snapshot of the cache, from the oldest record to the most recent one.
    pub fn snapshot(&self) -> Vec<Arc<EventRecord>> {
        match self {
            EphemeralCache::LockFree(store) => store.snapshot().collect_vec(),
            EphemeralCache::Locked(store) => store.snapshot().collect_vec(),
        }
    }

    /// Evaluate the filters and return the matching records, concatenated in filter order.
    pub fn query(&self, filters: &[Filter]) -> Vec<Arc<EventRecord>> {
        match self {
            EphemeralCache::LockFree(store) => QueryExecutor::new(store.as_ref()).execute(filters),
            EphemeralCache::Locked(store) => QueryExecutor::new(store.as_ref()).execute(filters),
        }
    }

    /// Evaluate the filters, then discard the result if `cancel` has been cancelled meanwhile.
    pub fn query_with_cancel(&self, filters: &[Filter], cancel: &CancellationToken) -> Result<Vec<Arc<EventRecord>>> {
        match self {
            EphemeralCache::LockFree(store) => QueryExecutor::new(store.as_ref()).execute_with_cancel(filters, cancel),
            EphemeralCache::Locked(store) => QueryExecutor::new(store.as_ref()).execute_with_cancel(filters, cancel),
        }
    }

    /// Fixed slot count.
    pub fn capacity(&self) -> usize {
        match self {
            EphemeralCache::LockFree(store) => store.capacity(),
            EphemeralCache::Locked(store) => store.capacity(),
        }
    }

    /// Occupied slot count.
    pub fn len(&self) -> usize {
        match self {
            EphemeralCache::LockFree(store) => store.len(),
            EphemeralCache::Locked(store) => store.len(),
        }
    }

    /// Whether no record has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the cache.
    pub fn name(&self) -> &str {
        match self {
            EphemeralCache::LockFree(store) => store.name(),
            EphemeralCache::Locked(store) => store.name(),
        }
    }

    /// Ring implementation of the cache.
    pub fn strategy(&self) -> RingStrategy {
        match self {
            EphemeralCache::LockFree(_) => RingStrategy::LockFree,
            EphemeralCache::Locked(_) => RingStrategy::Locked,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use ephemera_common::error::ErrorKind;

    use super::*;
    use crate::test_utils::{ids, record};

    const STRATEGIES: [RingStrategy; 2] = [RingStrategy::LockFree, RingStrategy::Locked];

    fn is_send_sync_static<T: Send + Sync + 'static>() {}

    #[test]
    fn test_send_sync_static() {
        is_send_sync_static::<EphemeralCache>();
    }

    #[test]
    fn test_zero_capacity() {
        for strategy in STRATEGIES {
            let err = EphemeralCacheBuilder::new(0).with_strategy(strategy).build().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Config);
        }
    }

    #[test]
    fn test_builder() {
        let cache = EphemeralCacheBuilder::new(16)
            .with_name("presence")
            .with_strategy(RingStrategy::Locked)
            .build()
            .unwrap();
        assert_eq!(cache.name(), "presence");
        assert_eq!(cache.capacity(), 16);
        assert_eq!(cache.strategy(), RingStrategy::Locked);
        assert!(cache.is_empty());

        let cache = EphemeralCacheBuilder::new(16).build().unwrap();
        assert_eq!(cache.name(), DEFAULT_NAME);
        assert_eq!(cache.strategy(), RingStrategy::LockFree);
    }

    #[test_log::test]
    fn test_put_query() {
        for strategy in STRATEGIES {
            let cache = EphemeralCacheBuilder::new(5).with_strategy(strategy).build().unwrap();
            for i in 0..8 {
                cache.put(record(i, i as u32)).unwrap();
            }
            assert_eq!(cache.len(), 5);
            assert_eq!(ids(cache.snapshot()), vec!["id-3", "id-4", "id-5", "id-6", "id-7"]);
            assert_eq!(
                ids(cache.query(&[Filter::new().with_kinds([3, 5, 7])])),
                vec!["id-3", "id-5", "id-7"]
            );
            assert_eq!(
                cache.put(EventRecord::default()).unwrap_err().kind(),
                ErrorKind::InvalidInput
            );
        }
    }

    #[test]
    fn test_clone_shares_ring() {
        for strategy in STRATEGIES {
            let cache = EphemeralCacheBuilder::new(64).with_strategy(strategy).build().unwrap();
            thread::scope(|s| {
                for t in 0..4 {
                    let cache = cache.clone();
                    s.spawn(move || {
                        for i in 0..16 {
                            cache.put(record(t * 16 + i, 0)).unwrap();
                        }
                    });
                }
            });
            assert_eq!(cache.len(), 64);
            assert_eq!(cache.snapshot().len(), 64);
        }
    }

    #[test]
    fn test_query_with_cancel() {
        let cache = EphemeralCacheBuilder::new(4).build().unwrap();
        cache.put(record(0, 20001)).unwrap();

        let cancel = CancellationToken::new();
        assert_eq!(cache.query_with_cancel(&[Filter::new()], &cancel).unwrap().len(), 1);
        cancel.cancel();
        assert_eq!(
            cache.query_with_cancel(&[Filter::new()], &cancel).unwrap_err().kind(),
            ErrorKind::Cancelled
        );
    }
}
