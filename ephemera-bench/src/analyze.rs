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
    fmt::Display,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use hdrhistogram::Histogram;
use parking_lot::RwLock;

/// Highest trackable latency, 60s in nanoseconds.
const MAX_LATENCY: u64 = 60_000_000_000;

#[derive(Debug)]
pub struct Metrics {
    pub put_ios: AtomicU64,
    pub put_invalid: AtomicU64,
    pub put_lats: RwLock<Histogram<u64>>,

    pub query_ios: AtomicU64,
    pub query_records: AtomicU64,
    pub query_lats: RwLock<Histogram<u64>>,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            put_ios: AtomicU64::new(0),
            put_invalid: AtomicU64::new(0),
            put_lats: RwLock::new(Histogram::new_with_bounds(1, MAX_LATENCY, 3)?),
            query_ios: AtomicU64::new(0),
            query_records: AtomicU64::new(0),
            query_lats: RwLock::new(Histogram::new_with_bounds(1, MAX_LATENCY, 3)?),
        })
    }

    pub fn record_put(&self, lat: Duration) {
        self.put_ios.fetch_add(1, Ordering::Relaxed);
        self.put_lats.write().saturating_record(lat.as_nanos() as u64);
    }

    pub fn record_query(&self, lat: Duration, records: usize) {
        self.query_ios.fetch_add(1, Ordering::Relaxed);
        self.query_records.fetch_add(records as u64, Ordering::Relaxed);
        self.query_lats.write().saturating_record(lat.as_nanos() as u64);
    }

    pub fn dump(&self) -> MetricsDump {
        let put_lats = self.put_lats.read();
        let query_lats = self.query_lats.read();
        MetricsDump {
            put_ios: self.put_ios.load(Ordering::Relaxed),
            put_invalid: self.put_invalid.load(Ordering::Relaxed),
            put_lats: Percentiles::of(&put_lats),
            query_ios: self.query_ios.load(Ordering::Relaxed),
            query_records: self.query_records.load(Ordering::Relaxed),
            query_lats: Percentiles::of(&query_lats),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Percentiles {
    p50: u64,
    p90: u64,
    p99: u64,
    p999: u64,
    max: u64,
}

impl Percentiles {
    fn of(histogram: &Histogram<u64>) -> Self {
        Self {
            p50: histogram.value_at_quantile(0.5),
            p90: histogram.value_at_quantile(0.9),
            p99: histogram.value_at_quantile(0.99),
            p999: histogram.value_at_quantile(0.999),
            max: histogram.max(),
        }
    }
}

impl Display for Percentiles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let d = |ns: u64| humantime::format_duration(Duration::from_nanos(ns));
        write!(
            f,
            "p50: {}, p90: {}, p99: {}, p999: {}, max: {}",
            d(self.p50),
            d(self.p90),
            d(self.p99),
            d(self.p999),
            d(self.max)
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsDump {
    put_ios: u64,
    put_invalid: u64,
    put_lats: Percentiles,
    query_ios: u64,
    query_records: u64,
    query_lats: Percentiles,
}

/// Throughput between two dumps, with the latency percentiles of the later one.
#[derive(Debug)]
pub struct Analysis {
    elapsed: Duration,
    put_iops: f64,
    put_invalid: u64,
    put_lats: Percentiles,
    query_iops: f64,
    query_rps: f64,
    query_lats: Percentiles,
}

pub fn analyze(elapsed: Duration, prev: &MetricsDump, now: &MetricsDump) -> Analysis {
    let secs = elapsed.as_secs_f64().max(f64::EPSILON);
    Analysis {
        elapsed,
        put_iops: (now.put_ios - prev.put_ios) as f64 / secs,
        put_invalid: now.put_invalid - prev.put_invalid,
        put_lats: now.put_lats,
        query_iops: (now.query_ios - prev.query_ios) as f64 / secs,
        query_rps: (now.query_records - prev.query_records) as f64 / secs,
        query_lats: now.query_lats,
    }
}

impl Display for Analysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "[{}] put iops: {:.0}/s, invalid puts: {}",
            humantime::format_duration(Duration::from_secs(self.elapsed.as_secs())),
            self.put_iops,
            self.put_invalid
        )?;
        writeln!(f, "    put lats: {}", self.put_lats)?;
        writeln!(
            f,
            "    query iops: {:.0}/s, query records: {:.0}/s",
            self.query_iops, self.query_rps
        )?;
        write!(f, "    query lats: {}", self.query_lats)
    }
}
