use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use volley::prelude::*;
use volley::{format_stat, MetricType, MetricValue, NopDialer, Shards, StatsdClient};

const BATCH_SIZES: &[usize] = &[1, 5, 10, 100, 1000];

const THREADS: usize = 8;

fn new_nop_client(batch: usize) -> StatsdClient {
    StatsdClient::builder_with_dialer(NopDialer)
        .with_namespace("flubber.")
        .with_tag_value("tagC")
        .with_buffered_stats(batch)
        .with_flush_interval(Duration::ZERO)
        .build()
        .unwrap()
}

fn benchmark_format_stat(c: &mut Criterion) {
    c.bench_function("format_stat_counter", |b| {
        b.iter(|| format_stat("test.count", MetricValue::Signed(1), MetricType::Counter, 1.0, &["tagA"]))
    });

    c.bench_function("format_stat_gauge_float", |b| {
        b.iter(|| format_stat("test.gauge", MetricValue::Float(1.5), MetricType::Gauge, 1.0, &["tagA"]))
    });

    c.bench_function("format_stat_timer_sampled", |b| {
        b.iter(|| format_stat("test.timer", MetricValue::Unsigned(10), MetricType::Timer, 0.5, &["tagA", "tagB"]))
    });

    c.bench_function("format_stat_newline_tag", |b| {
        b.iter(|| format_stat("test.gauge", MetricValue::Float(1.0), MetricType::Gauge, 1.0, &["hello\nworld"]))
    });
}

fn benchmark_client_send(c: &mut Criterion) {
    let mut group = c.benchmark_group("statsdclient_nop_counter_parallel");

    for &batch in BATCH_SIZES {
        // Every thread hits the same client and contends on its buffer
        let shared = Arc::new(new_nop_client(batch));
        group.bench_with_input(BenchmarkId::new("shared", batch), &batch, |b, _| {
            b.iter_custom(|iters| {
                run_parallel(iters, |_| {
                    let client = Arc::clone(&shared);
                    move || {
                        let _ = client.count("some.counter", 123);
                    }
                })
            })
        });

        // Every thread gets its own clone
        let shards = Arc::new(Shards::new(new_nop_client(batch), THREADS).unwrap());
        group.bench_with_input(BenchmarkId::new("sharded", batch), &batch, |b, _| {
            b.iter_custom(|iters| {
                run_parallel(iters, |id| {
                    let shards = Arc::clone(&shards);
                    move || {
                        let _ = shards.shard(id).count("some.counter", 123);
                    }
                })
            })
        });
    }

    group.finish();
}

/// Split `iters` calls over `THREADS` threads, each running the operation
/// built for it by `make`, and return the wall time until all are done.
fn run_parallel<M, F>(iters: u64, make: M) -> Duration
where
    M: Fn(usize) -> F,
    F: FnMut() + Send + 'static,
{
    let barrier = Arc::new(Barrier::new(THREADS + 1));
    let per_thread = iters / THREADS as u64;
    let remainder = iters % THREADS as u64;

    let threads: Vec<_> = (0..THREADS)
        .map(|id| {
            let mut op = make(id);
            let barrier = Arc::clone(&barrier);
            let count = per_thread + if (id as u64) < remainder { 1 } else { 0 };
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..count {
                    op();
                }
            })
        })
        .collect();

    barrier.wait();
    let start = Instant::now();
    for t in threads {
        t.join().unwrap();
    }
    start.elapsed()
}

fn benchmark_client_tags(c: &mut Criterion) {
    let client = new_nop_client(100);

    c.bench_function("statsdclient_nop_counter_tags", |b| {
        b.iter(|| {
            client
                .count_with_tags("some.counter", 123)
                .with_tag("tag", "val")
                .with_tag("another", "thing")
                .try_send()
        })
    });
}

criterion_group!(benches, benchmark_format_stat, benchmark_client_send, benchmark_client_tags);

criterion_main!(benches);
