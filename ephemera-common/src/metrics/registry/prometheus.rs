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

use std::{borrow::Cow, collections::HashMap, sync::Arc};

use itertools::Itertools;
use parking_lot::Mutex;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};

use crate::metrics::{
    registry::noop::NoopMetricsRegistry, BoxedCounter, BoxedCounterVec, BoxedGauge, BoxedGaugeVec, BoxedHistogram,
    BoxedHistogramVec, Boxer, CounterOps, CounterVecOps, GaugeOps, GaugeVecOps, HistogramOps, HistogramVecOps,
    RegistryOps,
};

#[derive(Debug, Clone)]
enum MetricVec {
    Counter(IntCounterVec),
    Gauge(IntGaugeVec),
    Histogram(HistogramVec),
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct Metadata {
    name: Cow<'static, str>,
    desc: Cow<'static, str>,
    label_names: &'static [&'static str],
}

impl CounterOps for IntCounter {
    fn increase(&self, val: u64) {
        self.inc_by(val);
    }
}

impl CounterVecOps for IntCounterVec {
    fn counter(&self, labels: &[Cow<'static, str>]) -> BoxedCounter {
        let labels = labels.iter().map(Cow::as_ref).collect_vec();
        self.with_label_values(&labels).boxed()
    }
}

impl GaugeOps for IntGauge {
    fn increase(&self, val: u64) {
        self.add(val as _);
    }

    fn decrease(&self, val: u64) {
        self.sub(val as _);
    }

    fn absolute(&self, val: u64) {
        self.set(val as _);
    }
}

impl GaugeVecOps for IntGaugeVec {
    fn gauge(&self, labels: &[Cow<'static, str>]) -> BoxedGauge {
        let labels = labels.iter().map(Cow::as_ref).collect_vec();
        self.with_label_values(&labels).boxed()
    }
}

impl HistogramOps for Histogram {
    fn record(&self, val: f64) {
        self.observe(val);
    }
}

impl HistogramVecOps for HistogramVec {
    fn histogram(&self, labels: &[Cow<'static, str>]) -> BoxedHistogram {
        let labels = labels.iter().map(Cow::as_ref).collect_vec();
        self.with_label_values(&labels).boxed()
    }
}

/// Prometheus metric registry with lib `prometheus`.
///
/// The [`PrometheusMetricsRegistry`] can be cloned and shared by multiple ephemeral caches. Metric vectors are
/// registered once per registry and reused afterwards.
#[derive(Debug, Clone)]
pub struct PrometheusMetricsRegistry {
    registry: Registry,
    vecs: Arc<Mutex<HashMap<Metadata, MetricVec>>>,
}

impl PrometheusMetricsRegistry {
    /// Create an Prometheus metrics registry.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            vecs: Arc::default(),
        }
    }

    /// The wrapped registry, for gathering.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn get_or_register(
        &self,
        metadata: Metadata,
        create: impl FnOnce(&Metadata) -> prometheus::Result<MetricVec>,
    ) -> Option<MetricVec> {
        let mut vecs = self.vecs.lock();
        if let Some(vec) = vecs.get(&metadata) {
            return Some(vec.clone());
        }
        let vec = create(&metadata).and_then(|vec| {
            let collector: Box<dyn prometheus::core::Collector> = match &vec {
                MetricVec::Counter(v) => Box::new(v.clone()),
                MetricVec::Gauge(v) => Box::new(v.clone()),
                MetricVec::Histogram(v) => Box::new(v.clone()),
            };
            self.registry.register(collector)?;
            Ok(vec)
        });
        match vec {
            Ok(vec) => {
                vecs.insert(metadata, vec.clone());
                Some(vec)
            }
            Err(e) => {
                tracing::warn!(?e, name = %metadata.name, "[metrics]: register metric vec failed, fallback to noop");
                None
            }
        }
    }
}

impl RegistryOps for PrometheusMetricsRegistry {
    fn register_counter_vec(
        &self,
        name: Cow<'static, str>,
        desc: Cow<'static, str>,
        label_names: &'static [&'static str],
    ) -> BoxedCounterVec {
        let metadata = Metadata {
            name,
            desc,
            label_names,
        };
        match self.get_or_register(metadata, |m| {
            IntCounterVec::new(Opts::new(m.name.clone(), m.desc.clone()), m.label_names).map(MetricVec::Counter)
        }) {
            Some(MetricVec::Counter(v)) => v.boxed(),
            _ => NoopMetricsRegistry.boxed(),
        }
    }

    fn register_gauge_vec(
        &self,
        name: Cow<'static, str>,
        desc: Cow<'static, str>,
        label_names: &'static [&'static str],
    ) -> BoxedGaugeVec {
        let metadata = Metadata {
            name,
            desc,
            label_names,
        };
        match self.get_or_register(metadata, |m| {
            IntGaugeVec::new(Opts::new(m.name.clone(), m.desc.clone()), m.label_names).map(MetricVec::Gauge)
        }) {
            Some(MetricVec::Gauge(v)) => v.boxed(),
            _ => NoopMetricsRegistry.boxed(),
        }
    }

    fn register_histogram_vec(
        &self,
        name: Cow<'static, str>,
        desc: Cow<'static, str>,
        label_names: &'static [&'static str],
    ) -> BoxedHistogramVec {
        let metadata = Metadata {
            name,
            desc,
            label_names,
        };
        match self.get_or_register(metadata, |m| {
            HistogramVec::new(HistogramOpts::new(m.name.clone(), m.desc.clone()), m.label_names)
                .map(MetricVec::Histogram)
        }) {
            Some(MetricVec::Histogram(v)) => v.boxed(),
            _ => NoopMetricsRegistry.boxed(),
        }
    }
}
