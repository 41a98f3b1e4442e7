#[macro_use]
extern crate criterion;

use criterion::Criterion;
use datastructures::*;

use std::sync::Arc;

fn histogram() -> TimeWindowHistogram {
    let config = DistributionConfig {
        percentiles: Some(vec![0.5, 0.9, 0.99]),
        service_level_objectives: Some(vec![1_000_000.0, 10_000_000.0, 100_000_000.0]),
        ..DistributionConfig::default_config()
    };
    TimeWindowHistogram::new(
        Arc::new(SystemClock::default()),
        &config,
        HistogramOptions::default(),
    )
    .expect("valid config")
}

fn time_window_histogram_record(c: &mut Criterion) {
    let histogram = histogram();
    c.bench_function("time window histogram record", move |b| {
        b.iter(|| histogram.record(1_000_000_000.0))
    });
}

fn time_window_histogram_percentile(c: &mut Criterion) {
    let histogram = histogram();
    histogram.record(1_000_000_000.0);
    c.bench_function("time window histogram percentile", move |b| {
        b.iter(|| histogram.percentile(0.99))
    });
}

fn time_window_histogram_snapshot(c: &mut Criterion) {
    let histogram = histogram();
    for value in 0..10_000 {
        histogram.record(value as f64 * 1_000.0);
    }
    c.bench_function("time window histogram snapshot", move |b| {
        b.iter(|| histogram.take_snapshot())
    });
}

criterion_group!(
    benches,
    time_window_histogram_record,
    time_window_histogram_percentile,
    time_window_histogram_snapshot,
);
criterion_main!(benches);
