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

//! Load generator for the ephemera ephemeral cache.

mod analyze;

use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

use analyze::{analyze, Metrics, MetricsDump};
use clap::{Parser, ValueEnum};
use ephemera::{BoxedRegistry, EphemeralCache, EphemeralCacheBuilder, EventRecord, Filter, RingStrategy};
use itertools::Itertools;
use rand::{rngs::StdRng, Rng, SeedableRng};

const EPHEMERAL_KIND_BASE: u32 = 20000;
/// Width of the ephemeral kind range `[20000, 30000)`.
const EPHEMERAL_KIND_COUNT: u32 = 10000;
const TOPICS: usize = 8;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Ring capacity. (records)
    #[arg(long, default_value_t = 64 * 1024)]
    capacity: usize,

    /// Writer count.
    #[arg(long, default_value_t = 8)]
    writers: usize,

    /// Reader count.
    #[arg(long, default_value_t = 8)]
    readers: usize,

    /// Bench duration, e.g. "30s", "2m".
    #[arg(short, long, default_value = "30s")]
    time: humantime::Duration,

    /// Interval between two reports.
    #[arg(long, default_value = "2s")]
    report_interval: humantime::Duration,

    /// Result limit of each reader filter. `0` means unlimited.
    #[arg(long, default_value_t = 100)]
    limit: usize,

    /// Count of distinct ephemeral kinds written by writers, at most 10000.
    #[arg(long, default_value_t = 16, value_parser = clap::value_parser!(u32).range(1..=EPHEMERAL_KIND_COUNT as i64))]
    kinds: u32,

    /// Ring implementation.
    #[arg(long, value_enum, default_value_t = Strategy::LockFree)]
    strategy: Strategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Strategy {
    LockFree,
    Locked,
}

impl From<Strategy> for RingStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::LockFree => RingStrategy::LockFree,
            Strategy::Locked => RingStrategy::Locked,
        }
    }
}

struct Context {
    args: Args,
    cache: EphemeralCache,
    metrics: Metrics,
    stop: AtomicBool,
}

fn init_logger() {
    use tracing_subscriber::{prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_line_number(true))
        .with(EnvFilter::from_default_env())
        .init();
}

#[cfg(feature = "prometheus")]
fn registry() -> (BoxedRegistry, prometheus::Registry) {
    let registry = prometheus::Registry::new();
    let boxed: BoxedRegistry = Box::new(ephemera::PrometheusMetricsRegistry::new(registry.clone()));
    (boxed, registry)
}

#[cfg(not(feature = "prometheus"))]
fn registry() -> (BoxedRegistry, ()) {
    (Box::new(ephemera::NoopMetricsRegistry), ())
}

fn main() -> anyhow::Result<()> {
    init_logger();

    let args = Args::parse();
    println!("{args:#?}");

    let (boxed, _registry) = registry();
    let cache = EphemeralCacheBuilder::new(args.capacity)
        .with_name("bench")
        .with_strategy(args.strategy.into())
        .with_metrics_registry(boxed)
        .build()?;

    let context = Context {
        args,
        cache,
        metrics: Metrics::new()?,
        stop: AtomicBool::new(false),
    };

    let start = Instant::now();
    thread::scope(|s| {
        let writers = (0..context.args.writers)
            .map(|id| {
                let context = &context;
                s.spawn(move || write(id, context))
            })
            .collect_vec();
        let readers = (0..context.args.readers)
            .map(|id| {
                let context = &context;
                s.spawn(move || read(id, context))
            })
            .collect_vec();

        monitor(&context);
        context.stop.store(true, Ordering::Relaxed);

        for handle in writers.into_iter().chain(readers) {
            if handle.join().is_err() {
                tracing::error!("[bench]: worker panicked");
            }
        }
    });

    let analysis = analyze(start.elapsed(), &MetricsDump::default(), &context.metrics.dump());
    println!("\nTotal:\n{analysis}");

    #[cfg(feature = "prometheus")]
    {
        use prometheus::Encoder;

        let mut buffer = vec![];
        prometheus::TextEncoder::new().encode(&_registry.gather(), &mut buffer)?;
        println!("\n{}", String::from_utf8_lossy(&buffer));
    }

    Ok(())
}

fn monitor(context: &Context) {
    let time: Duration = context.args.time.into();
    let interval: Duration = context.args.report_interval.into();

    let start = Instant::now();
    let mut last = Instant::now();
    let mut prev = context.metrics.dump();

    while start.elapsed() < time {
        thread::sleep(interval.min(time.saturating_sub(start.elapsed())));
        let now = context.metrics.dump();
        println!("{}", analyze(last.elapsed(), &prev, &now));
        prev = now;
        last = Instant::now();
    }
}

fn record(writer: usize, seq: u64, kinds: u32) -> EventRecord {
    EventRecord::builder(format!("{writer:016x}{seq:048x}"))
        .with_author(format!("{writer:064x}"))
        .with_kind(EPHEMERAL_KIND_BASE + (seq % kinds as u64) as u32)
        .with_created_at(seq as i64)
        .with_tag(vec!["t".to_string(), format!("topic-{}", seq as usize % TOPICS)])
        .with_content(format!("typing {seq}"))
        .build()
}

fn write(id: usize, context: &Context) {
    let mut seq = 0;
    while !context.stop.load(Ordering::Relaxed) {
        let record = record(id, seq, context.args.kinds);

        let now = Instant::now();
        let res = context.cache.put(record);
        let lat = now.elapsed();

        match res {
            Ok(()) => context.metrics.record_put(lat),
            Err(e) => {
                tracing::warn!(error = %e, "[bench]: put failed");
                context.metrics.put_invalid.fetch_add(1, Ordering::Relaxed);
            }
        }
        seq += 1;
    }
}

fn read(id: usize, context: &Context) {
    let mut rng = StdRng::seed_from_u64(id as u64);

    while !context.stop.load(Ordering::Relaxed) {
        let kind = EPHEMERAL_KIND_BASE + rng.random_range(0..context.args.kinds);
        let topic = format!("topic-{}", rng.random_range(0..TOPICS));
        let mut filter = Filter::new().with_kinds([kind]).with_tag("t", [topic]);
        if context.args.limit > 0 {
            filter = filter.with_limit(context.args.limit);
        }

        let now = Instant::now();
        let records = context.cache.query(&[filter]);
        context.metrics.record_query(now.elapsed(), records.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_stay_ephemeral() {
        assert!(Args::try_parse_from(["ephemera-bench", "--kinds", "0"]).is_err());
        assert!(Args::try_parse_from(["ephemera-bench", "--kinds", "10001"]).is_err());
        assert!(Args::try_parse_from(["ephemera-bench", "--kinds", "4294967295"]).is_err());

        let args = Args::try_parse_from(["ephemera-bench", "--kinds", "10000"]).unwrap();
        let record = record(0, u64::from(args.kinds) - 1, args.kinds);
        assert_eq!(record.kind(), 29999);
        assert_eq!(record.kind_class(), ephemera::KindClass::Ephemeral);
    }
}
