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

use std::borrow::Cow;

use super::{registry::noop::NoopMetricsRegistry, BoxedCounter, BoxedGauge, BoxedHistogram, RegistryOps};

/// Metrics of one ephemeral cache instance, labelled by the cache name.
#[derive(Debug)]
pub struct Metrics {
    /// Accepted puts.
    pub put: BoxedCounter,
    /// Refused puts.
    pub put_invalid: BoxedCounter,
    /// Records overwritten by a newer put.
    pub evict: BoxedCounter,
    /// Executed filters.
    pub query: BoxedCounter,
    /// Records returned by queries.
    pub query_record: BoxedCounter,
    /// Queries whose result was discarded after cancellation.
    pub query_cancel: BoxedCounter,

    /// Occupied slots.
    pub usage: BoxedGauge,

    /// Query duration in seconds.
    pub query_duration: BoxedHistogram,
}

impl Metrics {
    /// Create a new metric with the given name.
    pub fn new(name: impl Into<Cow<'static, str>>, registry: &dyn RegistryOps) -> Self {
        let name = name.into();

        let ephemera_op_total = registry.register_counter_vec(
            "ephemera_op_total".into(),
            "ephemera ephemeral cache operations".into(),
            &["name", "op"],
        );
        let ephemera_usage = registry.register_gauge_vec(
            "ephemera_usage".into(),
            "ephemera ephemeral cache occupied slots".into(),
            &["name"],
        );
        let ephemera_op_duration = registry.register_histogram_vec(
            "ephemera_op_duration".into(),
            "ephemera ephemeral cache op durations".into(),
            &["name", "op"],
        );

        let put = ephemera_op_total.counter(&[name.clone(), "put".into()]);
        let put_invalid = ephemera_op_total.counter(&[name.clone(), "put_invalid".into()]);
        let evict = ephemera_op_total.counter(&[name.clone(), "evict".into()]);
        let query = ephemera_op_total.counter(&[name.clone(), "query".into()]);
        let query_record = ephemera_op_total.counter(&[name.clone(), "query_record".into()]);
        let query_cancel = ephemera_op_total.counter(&[name.clone(), "query_cancel".into()]);

        let usage = ephemera_usage.gauge(&[name.clone()]);

        let query_duration = ephemera_op_duration.histogram(&[name, "query".into()]);

        Self {
            put,
            put_invalid,
            evict,
            query,
            query_record,
            query_cancel,
            usage,
            query_duration,
        }
    }

    /// Create metrics that record nothing.
    pub fn noop() -> Self {
        Self::new("noop", &NoopMetricsRegistry)
    }
}
