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
    error::{Error, Result},
    metrics::Metrics,
    record::EventRecord,
};

/// Default name of an ephemeral store, used as the metrics label.
pub const DEFAULT_NAME: &str = "ephemeral";

/// Construction config shared by all ring implementations.
#[derive(Debug)]
pub struct RingConfig {
    /// Name of the store, used as the metrics label.
    pub name: Cow<'static, str>,
    /// Fixed slot count, must be positive.
    pub capacity: usize,
    /// Metrics of the store.
    pub metrics: Arc<Metrics>,
}

impl RingConfig {
    /// Config with noop metrics and the default name.
    pub fn new(capacity: usize) -> Self {
        Self {
            name: DEFAULT_NAME.into(),
            capacity,
            metrics: Arc::new(Metrics::noop()),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::zero_capacity().with_context("name", &self.name));
        }
        Ok(())
    }
}

/// A point-in-time enumeration of a store, from the oldest record to the most recent one.
///
/// A snapshot is finite and cannot be restarted.
pub trait Snapshot: Iterator<Item = Arc<EventRecord>> {
    /// The occupancy observed when the snapshot was taken.
    ///
    /// The snapshot yields at most this many records.
    fn observed(&self) -> usize;
}

/// A fixed-capacity, insertion-ordered container of ephemeral records.
///
/// Once the store is full, every put evicts exactly the oldest surviving record.
pub trait EphemeralStore: Send + Sync + 'static + Debug {
    /// Snapshot type of the store.
    type Snapshot<'a>: Snapshot
    where
        Self: 'a;

    /// Store a record in the next slot, evicting the oldest record if the store is full.
    ///
    /// Returns an [`ephemera_common::error::ErrorKind::InvalidInput`] error without touching the store if the
    /// record is absent.
    fn put(&self, record: impl Into<Arc<EventRecord>>) -> Result<()>;

    /// Take a snapshot of the store.
    fn snapshot(&self) -> Self::Snapshot<'_>;

    /// Fixed slot count.
    fn capacity(&self) -> usize;

    /// Occupied slot count, never larger than the capacity.
    fn len(&self) -> usize;

    /// Whether no record has been stored yet.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the store.
    fn name(&self) -> &str;

    /// Metrics of the store.
    fn metrics(&self) -> &Metrics;
}
