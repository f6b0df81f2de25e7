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

use std::{fmt::Debug, future::Future, slice, sync::Arc};

use ephemera_common::{
    error::{Error, Result},
    filter::Filter,
    record::{EventRecord, KindClass},
};
use ephemera_memory::EphemeralCache;
use tokio_util::sync::CancellationToken;

const DEFAULT_RESULT_CAPACITY: usize = 16;
const MAX_RESULT_CAPACITY: usize = 2048;
const RECORDS_PER_FILTER: usize = 32;

/// The persistent store that keeps every non-ephemeral record of the relay.
pub trait DurableStore: Send + Sync + 'static + Debug {
    /// Persist a regular record.
    #[must_use]
    fn save(&self, record: EventRecord) -> impl Future<Output = Result<()>> + Send;

    /// Persist a replaceable or addressable record, superseding the record it replaces.
    #[must_use]
    fn replace(&self, record: EventRecord) -> impl Future<Output = Result<()>> + Send;

    /// Query the records that match the filter.
    #[must_use]
    fn query(&self, filter: &Filter) -> impl Future<Output = Result<Vec<EventRecord>>> + Send;
}

/// A durable store that keeps nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDurableStore;

impl DurableStore for NoopDurableStore {
    async fn save(&self, _: EventRecord) -> Result<()> {
        Ok(())
    }

    async fn replace(&self, _: EventRecord) -> Result<()> {
        Ok(())
    }

    async fn query(&self, _: &Filter) -> Result<Vec<EventRecord>> {
        Ok(vec![])
    }
}

/// Pre-sized result capacity for a set of filters.
///
/// The sum of positive limits, or a fixed share per filter if no filter has a limit, clamped to `[16, 2048]`.
pub fn estimate_capacity(filters: &[Filter]) -> usize {
    if filters.is_empty() {
        return DEFAULT_RESULT_CAPACITY;
    }

    // Limits come from subscribers, so the sum saturates.
    let estimated = filters
        .iter()
        .filter_map(|filter| filter.limit)
        .filter(|&limit| limit > 0)
        .fold(None, |sum: Option<usize>, limit| {
            Some(sum.unwrap_or_default().saturating_add(limit))
        })
        .unwrap_or_else(|| filters.len().saturating_mul(RECORDS_PER_FILTER));

    estimated.clamp(DEFAULT_RESULT_CAPACITY, MAX_RESULT_CAPACITY)
}

/// Event and subscription hooks of a relay.
///
/// Ephemeral records go to the ephemeral cache, everything else goes to the durable store. Subscriptions read the
/// durable store for every filter, and the ephemeral cache only for filters that accept an ephemeral kind.
#[derive(Debug)]
pub struct Relay<D>
where
    D: DurableStore,
{
    cache: EphemeralCache,
    durable: D,
}

impl<D> Relay<D>
where
    D: DurableStore,
{
    /// Create the relay hooks over the given ephemeral cache and durable store.
    pub fn new(cache: EphemeralCache, durable: D) -> Self {
        Self { cache, durable }
    }

    /// The ephemeral cache.
    pub fn cache(&self) -> &EphemeralCache {
        &self.cache
    }

    /// The durable store.
    pub fn durable(&self) -> &D {
        &self.durable
    }

    /// Route a published record by the class of its kind.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "ephemera::relay::on_event"))]
    pub async fn on_event(&self, record: EventRecord) -> Result<()> {
        let class = record.kind_class();
        tracing::debug!(id = record.id(), kind = record.kind(), ?class, "[relay]: route event");

        match class {
            KindClass::Ephemeral => self.cache.put(record),
            KindClass::Replaceable | KindClass::Addressable => self.durable.replace(record).await,
            KindClass::Regular => self.durable.save(record).await,
        }
    }

    /// Collect the records matching the filters from both the durable store and the ephemeral cache.
    ///
    /// For each filter in order, durable matches come first, then ephemeral matches. Records matched by several
    /// filters are returned once per filter. A durable store failure fails the whole call, an ephemeral cache
    /// failure only drops the ephemeral matches of that filter.
    ///
    /// Cancellation is checked once the result is assembled.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "ephemera::relay::on_filters"))]
    pub async fn on_filters(&self, filters: &[Filter], cancel: &CancellationToken) -> Result<Vec<Arc<EventRecord>>> {
        let mut records = Vec::with_capacity(estimate_capacity(filters));

        for filter in filters {
            let durable = self.durable.query(filter).await.inspect_err(|e| {
                tracing::warn!(error = %e, "[relay]: durable query failed");
            })?;
            records.extend(durable.into_iter().map(Arc::new));

            if filter.has_ephemeral_kinds() {
                match self.cache.query_with_cancel(slice::from_ref(filter), cancel) {
                    Ok(ephemeral) => records.extend(ephemeral),
                    Err(e) => tracing::warn!(error = %e, "[relay]: ephemeral query failed, skipped"),
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(Error::cancelled(filters.len()));
        }

        tracing::trace!(filters = filters.len(), records = records.len(), "[relay]: filters served");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use ephemera_common::{error::ErrorKind, record::Kind};
    use ephemera_memory::{EphemeralCacheBuilder, RingStrategy};
    use parking_lot::Mutex;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Op {
        Save,
        Replace,
    }

    #[derive(Debug, Default)]
    struct MemoryDurableStore {
        records: Mutex<Vec<(Op, EventRecord)>>,
        fail: bool,
    }

    impl MemoryDurableStore {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn ops(&self) -> Vec<(Op, String)> {
            self.records
                .lock()
                .iter()
                .map(|(op, record)| (*op, record.id().to_string()))
                .collect()
        }
    }

    impl DurableStore for MemoryDurableStore {
        async fn save(&self, record: EventRecord) -> Result<()> {
            self.records.lock().push((Op::Save, record));
            Ok(())
        }

        async fn replace(&self, record: EventRecord) -> Result<()> {
            let mut records = self.records.lock();
            records.retain(|(_, r)| !(r.author() == record.author() && r.kind() == record.kind()));
            records.push((Op::Replace, record));
            Ok(())
        }

        async fn query(&self, filter: &Filter) -> Result<Vec<EventRecord>> {
            if self.fail {
                return Err(Error::external(
                    "durable store query failed",
                    anyhow::anyhow!("connection reset"),
                ));
            }
            let records = self.records.lock();
            let matches = records.iter().map(|(_, r)| r).filter(|r| filter.matches(r));
            let limit = filter.effective_limit(records.len());
            Ok(matches.take(limit).cloned().collect())
        }
    }

    fn record(id: &str, kind: Kind) -> EventRecord {
        EventRecord::builder(id)
            .with_author("test-pubkey")
            .with_kind(kind)
            .with_tag(vec!["e", "test-tag"])
            .build()
    }

    fn ids(records: &[Arc<EventRecord>]) -> Vec<&str> {
        records.iter().map(|r| r.id()).collect()
    }

    fn relay(durable: MemoryDurableStore) -> Relay<MemoryDurableStore> {
        let cache = EphemeralCacheBuilder::new(5).build().unwrap();
        Relay::new(cache, durable)
    }

    #[test]
    fn test_estimate_capacity() {
        assert_eq!(estimate_capacity(&[]), 16);
        assert_eq!(estimate_capacity(&[Filter::new()]), 32);
        assert_eq!(estimate_capacity(&[Filter::new().with_limit(3)]), 16);
        assert_eq!(
            estimate_capacity(&[Filter::new().with_limit(100), Filter::new(), Filter::new().with_limit(50)]),
            150
        );
        assert_eq!(estimate_capacity(&vec![Filter::new(); 100]), 2048);
        assert_eq!(estimate_capacity(&[Filter::new().with_limit(0), Filter::new()]), 64);
        assert_eq!(estimate_capacity(&[Filter::new().with_limit(usize::MAX / 4)]), 2048);
    }

    #[test]
    fn test_estimate_capacity_saturates() {
        assert_eq!(
            estimate_capacity(&[Filter::new().with_limit(usize::MAX), Filter::new().with_limit(2)]),
            2048
        );
        let half = usize::MAX / 2 + 1;
        assert_eq!(
            estimate_capacity(&[Filter::new().with_limit(half), Filter::new().with_limit(half)]),
            2048
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_route_by_kind() {
        let relay = relay(MemoryDurableStore::default());

        relay.on_event(record("regular", 1)).await.unwrap();
        relay.on_event(record("metadata", 0)).await.unwrap();
        relay.on_event(record("contacts", 3)).await.unwrap();
        relay.on_event(record("replaceable", 10002)).await.unwrap();
        relay.on_event(record("ephemeral", 20001)).await.unwrap();
        relay.on_event(record("addressable", 30023)).await.unwrap();
        relay.on_event(record("regular-high", 40000)).await.unwrap();

        assert_eq!(
            relay.durable().ops(),
            vec![
                (Op::Save, "regular".to_string()),
                (Op::Replace, "metadata".to_string()),
                (Op::Replace, "contacts".to_string()),
                (Op::Replace, "replaceable".to_string()),
                (Op::Replace, "addressable".to_string()),
                (Op::Save, "regular-high".to_string()),
            ]
        );
        assert_eq!(ids(&relay.cache().snapshot()), vec!["ephemeral"]);
    }

    #[tokio::test]
    async fn test_absent_ephemeral_record() {
        let relay = relay(MemoryDurableStore::default());
        let record = EventRecord::builder("").with_kind(20000).build();
        assert_eq!(
            relay.on_event(record).await.unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
        assert!(relay.cache().is_empty());
    }

    #[tokio::test]
    async fn test_filters_merge_sources() {
        let relay = relay(MemoryDurableStore::default());
        relay.on_event(record("d-0", 1)).await.unwrap();
        relay.on_event(record("e-0", 20000)).await.unwrap();
        relay.on_event(record("d-1", 1)).await.unwrap();
        relay.on_event(record("e-1", 20001)).await.unwrap();

        let cancel = CancellationToken::new();

        // Ephemeral kinds are only served from the cache when asked for.
        let records = relay.on_filters(&[Filter::new()], &cancel).await.unwrap();
        assert_eq!(ids(&records), vec!["d-0", "d-1"]);

        let filters = [Filter::new().with_kinds([1, 20001])];
        let records = relay.on_filters(&filters, &cancel).await.unwrap();
        assert_eq!(ids(&records), vec!["d-0", "d-1", "e-1"]);

        // No de-duplication across overlapping filters.
        let filters = [Filter::new().with_kinds([20000]), Filter::new().with_kinds([20000, 20001])];
        let records = relay.on_filters(&filters, &cancel).await.unwrap();
        assert_eq!(ids(&records), vec!["e-0", "e-0", "e-1"]);
    }

    #[tokio::test]
    async fn test_filters_locked_strategy() {
        let cache = EphemeralCacheBuilder::new(2)
            .with_strategy(RingStrategy::Locked)
            .build()
            .unwrap();
        let relay = Relay::new(cache, NoopDurableStore);
        for i in 0..4 {
            relay.on_event(record(&format!("e-{i}"), 20000)).await.unwrap();
        }
        let records = relay
            .on_filters(&[Filter::new().with_kinds([20000])], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(ids(&records), vec!["e-2", "e-3"]);
    }

    #[tokio::test]
    async fn test_durable_failure() {
        let relay = relay(MemoryDurableStore::failing());
        relay.on_event(record("e-0", 20000)).await.unwrap();

        let err = relay
            .on_filters(&[Filter::new().with_kinds([20000])], &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::External);
    }

    #[test_log::test(tokio::test)]
    async fn test_cancelled() {
        let relay = relay(MemoryDurableStore::default());
        relay.on_event(record("e-0", 20000)).await.unwrap();
        relay.on_event(record("d-0", 1)).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = relay
            .on_filters(&[Filter::new().with_kinds([1, 20000])], &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn test_shared_across_tasks() {
        let relay = Arc::new(Relay::new(EphemeralCacheBuilder::new(64).build().unwrap(), NoopDurableStore));

        let handles = (0..4)
            .map(|t| {
                let relay = relay.clone();
                tokio::spawn(async move {
                    for i in 0..8 {
                        relay.on_event(record(&format!("e-{t}-{i}"), 20000 + t)).await.unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(relay.cache().len(), 32);
        let filters = [Filter::new().with_kinds([20002]).with_limit(3)];
        let records = relay.on_filters(&filters, &CancellationToken::new()).await.unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.kind() == 20002));
    }

    #[tokio::test]
    async fn test_filters_with_huge_limits() {
        let relay = relay(MemoryDurableStore::default());
        relay.on_event(record("d-0", 1)).await.unwrap();
        relay.on_event(record("e-0", 20000)).await.unwrap();

        let filters: Vec<Filter> =
            serde_json::from_str(r#"[{"limit":18446744073709551615},{"kinds":[20000],"limit":1}]"#).unwrap();
        let records = relay.on_filters(&filters, &CancellationToken::new()).await.unwrap();
        assert_eq!(ids(&records), vec!["d-0", "e-0"]);
    }

    #[test]
    fn test_json_event() {
        let record: EventRecord = serde_json::from_str(
            r#"{"id":"abc","pubkey":"def","created_at":1,"kind":20001,"tags":[["e","x"]],"content":"hi","sig":"00"}"#,
        )
        .unwrap();
        assert_eq!(record.kind_class(), KindClass::Ephemeral);
    }
}
