// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use meterline::*;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn registry(config: RegistryConfig) -> (Arc<MockClock>, Arc<MeterRegistry>) {
    let mock = Arc::new(MockClock::new());
    let clock: Arc<dyn Clock> = mock.clone();
    (mock, Arc::new(MeterRegistry::new(clock, config)))
}

#[test]
fn timer_window_slides() {
    let (clock, registry) = registry(RegistryConfig {
        distribution: DistributionConfig {
            expiry: Some(Duration::from_secs(4)),
            buffer_length: Some(4),
            ..DistributionConfig::none()
        },
        ..RegistryConfig::default()
    });
    let config = DistributionConfig {
        percentiles: Some(vec![0.0, 1.0]),
        ..DistributionConfig::none()
    };
    let timer = registry
        .timer(Id::new("latency", &[]), &config)
        .expect("registered");

    timer.record(Duration::from_millis(10));
    timer.record(Duration::from_millis(20));

    let low = timer
        .percentile(0.0, TimeUnit::Milliseconds)
        .expect("valid percentile");
    let high = timer
        .percentile(1.0, TimeUnit::Milliseconds)
        .expect("valid percentile");
    assert!(low > 9.0 && low < 11.0, "{}", low);
    assert!(high > 19.0 && high < 21.0, "{}", high);

    clock.add(Duration::from_millis(3_999));
    assert_eq!(timer.percentile(1.0, TimeUnit::Milliseconds), Ok(high));
    assert_eq!(timer.max(TimeUnit::Milliseconds), 20.0);

    clock.add(Duration::from_millis(1));
    let snapshot = timer.take_snapshot();
    assert_eq!(snapshot.count(), 2);
    assert_eq!(snapshot.max(), 0.0);
    for pv in snapshot.percentile_values() {
        assert_eq!(pv.value, 0.0);
    }
}

#[test]
fn extreme_values_are_absorbed() {
    let (_, registry) = registry(RegistryConfig::default());
    let config = DistributionConfig {
        percentiles: Some(vec![0.5, 1.0]),
        percentile_histogram: Some(true),
        ..DistributionConfig::none()
    };
    let summary = registry
        .summary(Id::new("sizes", &[]), &config)
        .expect("registered");

    summary.record(f64::MAX);
    summary.record(f64::NAN);
    summary.record(f64::NEG_INFINITY);
    summary.record(0.0);

    assert_eq!(summary.count(), 2);
    let top = summary.percentile(1.0).expect("valid percentile");
    assert!(top.is_finite() && top > 0.0, "{}", top);
    assert_eq!(summary.histogram_count_at_value(f64::MAX), 2);
    assert!(summary.percentile(-0.1).is_err());
}

#[test]
fn counts_are_monotonic_in_value() {
    let (_, registry) = registry(RegistryConfig::default());
    let config = DistributionConfig {
        percentiles: Some(vec![0.5]),
        ..DistributionConfig::none()
    };
    let summary = registry
        .summary(Id::new("sizes", &[]), &config)
        .expect("registered");
    for i in 0..1_000 {
        summary.record((i * 7 % 997) as f64 + 0.5);
    }

    let mut previous = 0;
    let mut value = 0.25;
    while value < 2_000.0 {
        let count = summary.histogram_count_at_value(value);
        assert!(count >= previous, "{} at {}", count, value);
        previous = count;
        value *= 1.1;
    }
    assert_eq!(previous, 1_000);

    let first = summary.percentile(0.5).expect("valid percentile");
    assert_eq!(summary.percentile(0.5), Ok(first));
}

#[test]
fn step_registry_publishes_deltas() {
    let (clock, registry) = registry(RegistryConfig {
        temporality: Temporality::Step(Duration::from_secs(10)),
        common_tags: vec![Tag::new("host", "a")],
        ..RegistryConfig::default()
    });
    let counter = registry
        .counter(Id::new("requests.total", &[]))
        .expect("registered");
    let sizes = registry
        .summary(Id::new("payload", &[]), &DistributionConfig::none())
        .expect("registered");

    counter.increment_by(5.0);
    sizes.record(100.0);
    clock.add(Duration::from_secs(10));
    counter.increment_by(2.0);

    let mut publisher = JsonPublisher::new(Vec::new(), NamingConvention::Snake);
    publish_once(&registry, &mut publisher).expect("published");
    let output = String::from_utf8(publisher.into_inner()).expect("utf8");
    let document: serde_json::Value = serde_json::from_str(output.trim()).expect("json");

    let meters = document["meters"].as_array().expect("meters");
    assert_eq!(meters.len(), 2);

    let payload = &meters[0];
    assert_eq!(payload["name"], "payload");
    assert_eq!(payload["tags"]["host"], "a");
    assert_eq!(payload["snapshot"]["count"], 1);

    let requests = &meters[1];
    assert_eq!(requests["name"], "requests_total");
    assert_eq!(requests["measurements"][0]["statistic"], "count");
    assert_eq!(requests["measurements"][0]["value"], 5.0);

    clock.add(Duration::from_secs(10));
    assert_eq!(counter.count(), 2.0);
    clock.add(Duration::from_secs(20));
    assert_eq!(counter.count(), 0.0);
}

#[test]
fn concurrent_recording_and_publishing() {
    let (_, registry) = registry(RegistryConfig::default());
    let config = DistributionConfig {
        percentiles: Some(vec![0.99]),
        service_level_objectives: Some(vec![TimeUnit::Milliseconds.to_nanos(5.0)]),
        ..DistributionConfig::none()
    };

    let mut threads = Vec::new();
    for _ in 0..4 {
        let registry = registry.clone();
        let config = config.clone();
        threads.push(thread::spawn(move || {
            let timer = registry
                .timer(Id::new("latency", &[]), &config)
                .expect("registered");
            for i in 0..10_000u64 {
                timer.record(Duration::from_micros(i % 10_000));
            }
        }));
    }

    for _ in 0..10 {
        let reports = collect(&registry, NamingConvention::Dot);
        assert!(reports.len() <= 1);
    }

    for thread in threads {
        thread.join().expect("Failed to join child thread");
    }

    let timer = registry
        .get(&Id::new("latency", &[]))
        .and_then(|m| m.as_timer())
        .expect("timer");
    assert_eq!(timer.count(), 40_000);
    let snapshot = timer.take_snapshot();
    // 0us through 5000us inclusive, from each thread
    assert_eq!(snapshot.histogram_counts()[0].count, 4 * 5_001);
}
