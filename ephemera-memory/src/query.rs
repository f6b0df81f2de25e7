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

use std::{sync::Arc, time::Instant};

use ephemera_common::{
    error::{Error, Result},
    filter::Filter,
    record::EventRecord,
};
use tokio_util::sync::CancellationToken;

use crate::store::{EphemeralStore, Snapshot};

/// Evaluates filters against snapshots of an [`EphemeralStore`].
///
/// Each filter is evaluated against its own snapshot, from the oldest record to the most recent one, and stops as
/// soon as its effective limit is reached. The matches of all filters are concatenated in filter order. A record
/// matched by more than one filter appears once per matching filter.
#[derive(Debug)]
pub struct QueryExecutor<'a, S>
where
    S: EphemeralStore,
{
    store: &'a S,
}

impl<'a, S> QueryExecutor<'a, S>
where
    S: EphemeralStore,
{
    /// Create a query executor over the given store.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Evaluate the filters and return the matching records.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "ephemera::memory::query::execute"))]
    pub fn execute(&self, filters: &[Filter]) -> Vec<Arc<EventRecord>> {
        let now = Instant::now();

        let mut records = vec![];
        for filter in filters {
            self.scan(filter, &mut records);
        }

        let metrics = self.store.metrics();
        metrics.query.increase(filters.len() as u64);
        metrics.query_record.increase(records.len() as u64);
        metrics.query_duration.record(now.elapsed().as_secs_f64());

        tracing::trace!(
            name = self.store.name(),
            filters = filters.len(),
            records = records.len(),
            "[query]: filters evaluated"
        );

        records
    }

    /// Evaluate the filters, then discard the result if `cancel` has been cancelled meanwhile.
    ///
    /// Cancellation is checked once the result is assembled. It never interrupts a scan.
    pub fn execute_with_cancel(&self, filters: &[Filter], cancel: &CancellationToken) -> Result<Vec<Arc<EventRecord>>> {
        let records = self.execute(filters);

        if cancel.is_cancelled() {
            self.store.metrics().query_cancel.increase(1);
            tracing::debug!(
                name = self.store.name(),
                filters = filters.len(),
                dropped = records.len(),
                "[query]: cancelled, result dropped"
            );
            return Err(Error::cancelled(filters.len()).with_context("name", self.store.name()));
        }

        Ok(records)
    }

    fn scan(&self, filter: &Filter, records: &mut Vec<Arc<EventRecord>>) {
        let snapshot = self.store.snapshot();
        let limit = filter.effective_limit(snapshot.observed());
        records.extend(snapshot.filter(|record| filter.matches(record)).take(limit));
    }
}
