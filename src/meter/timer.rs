// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use super::{duration_nanos, DistributionRecorder, Id, Measurement, Statistic, Temporality, TimeUnit};

use datastructures::{
    Clock, ConfigError, DistributionConfig, HistogramError, HistogramOptions, HistogramSnapshot,
};

use std::sync::Arc;
use std::time::Duration;

/// Tracks the count, total time and distribution of short events.
///
/// Durations are recorded in nanoseconds, so the expected value range and
/// service level objectives of its distribution config are in nanoseconds
/// too. Reported values are converted into the registry's base time unit.
pub struct Timer {
    id: Id,
    clock: Arc<dyn Clock>,
    base_unit: TimeUnit,
    recorder: DistributionRecorder,
}

impl Timer {
    /// Defaults applied beneath a timer's own config: one millisecond to
    /// thirty seconds.
    pub fn default_config() -> DistributionConfig {
        DistributionConfig {
            minimum_expected_value: Some(TimeUnit::Milliseconds.to_nanos(1.0)),
            maximum_expected_value: Some(TimeUnit::Seconds.to_nanos(30.0)),
            ..DistributionConfig::none()
        }
    }

    pub(crate) fn new(
        id: Id,
        clock: &Arc<dyn Clock>,
        base_unit: TimeUnit,
        temporality: Temporality,
        config: &DistributionConfig,
        options: HistogramOptions,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            id,
            clock: clock.clone(),
            base_unit,
            recorder: DistributionRecorder::new(clock, temporality, config, options)?,
        })
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn base_time_unit(&self) -> TimeUnit {
        self.base_unit
    }

    pub fn record(&self, duration: Duration) {
        self.recorder.record(duration_nanos(duration));
    }

    /// Record an amount expressed in `unit`. Negative amounts are ignored.
    pub fn record_in(&self, amount: f64, unit: TimeUnit) {
        self.recorder.record(unit.to_nanos(amount));
    }

    /// Run `f`, recording how long it took.
    pub fn record_fn<T, F: FnOnce() -> T>(&self, f: F) -> T {
        let start = self.clock.monotonic_time();
        let result = f();
        let end = self.clock.monotonic_time();
        self.recorder.record(end.saturating_sub(start) as f64);
        result
    }

    /// Begin timing an event which can later be recorded into any timer.
    pub fn start(&self) -> TimerSample {
        TimerSample::start(&self.clock)
    }

    pub fn count(&self) -> u64 {
        self.recorder.count()
    }

    pub fn total_time(&self, unit: TimeUnit) -> f64 {
        unit.from_nanos(self.recorder.total())
    }

    pub fn max(&self, unit: TimeUnit) -> f64 {
        unit.from_nanos(self.recorder.max())
    }

    pub fn mean(&self, unit: TimeUnit) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.total_time(unit) / count as f64
        }
    }

    pub fn percentile(&self, percentile: f64, unit: TimeUnit) -> Result<f64, HistogramError> {
        self.recorder
            .percentile(percentile)
            .map(|nanos| unit.from_nanos(nanos))
    }

    pub fn histogram_count_at_value(&self, duration: Duration) -> u64 {
        self.recorder
            .histogram_count_at_value(duration_nanos(duration))
    }

    /// Snapshot with every time expressed in the base time unit.
    pub fn take_snapshot(&self) -> HistogramSnapshot {
        self.recorder
            .take_snapshot()
            .scaled(1.0 / self.base_unit.nanos())
    }

    pub(crate) fn measure(&self) -> Vec<Measurement> {
        vec![
            Measurement::new(Statistic::Count, self.count() as f64),
            Measurement::new(Statistic::TotalTime, self.total_time(self.base_unit)),
            Measurement::new(Statistic::Max, self.max(self.base_unit)),
        ]
    }
}

/// The start of an event being timed.
pub struct TimerSample {
    clock: Arc<dyn Clock>,
    start: u64,
}

impl TimerSample {
    pub fn start(clock: &Arc<dyn Clock>) -> Self {
        Self {
            clock: clock.clone(),
            start: clock.monotonic_time(),
        }
    }

    /// Record the time elapsed since the sample started into `timer`.
    pub fn stop(self, timer: &Timer) -> Duration {
        let elapsed = Duration::from_nanos(self.clock.monotonic_time().saturating_sub(self.start));
        timer.record(elapsed);
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datastructures::MockClock;

    fn timer(clock: &Arc<MockClock>, config: DistributionConfig) -> Timer {
        let clock: Arc<dyn Clock> = clock.clone();
        let config = config
            .merge(&Timer::default_config())
            .merge(&DistributionConfig::default_config());
        Timer::new(
            Id::new("latency", &[]),
            &clock,
            TimeUnit::Seconds,
            Temporality::Cumulative,
            &config,
            HistogramOptions::default(),
        )
        .expect("valid timer")
    }

    #[test]
    fn records_durations() {
        let clock = Arc::new(MockClock::new());
        let timer = timer(&clock, DistributionConfig::none());
        timer.record(Duration::from_millis(10));
        timer.record(Duration::from_millis(30));
        timer.record_in(-5.0, TimeUnit::Seconds);

        assert_eq!(timer.count(), 2);
        assert_eq!(timer.total_time(TimeUnit::Milliseconds), 40.0);
        assert_eq!(timer.max(TimeUnit::Milliseconds), 30.0);
        assert_eq!(timer.mean(TimeUnit::Milliseconds), 20.0);
        assert_eq!(
            timer.measure(),
            vec![
                Measurement::new(Statistic::Count, 2.0),
                Measurement::new(Statistic::TotalTime, 0.04),
                Measurement::new(Statistic::Max, 0.03),
            ]
        );
    }

    #[test]
    fn samples_and_closures() {
        let clock = Arc::new(MockClock::new());
        let timer = timer(&clock, DistributionConfig::none());

        let sample = timer.start();
        clock.add(Duration::from_millis(250));
        assert_eq!(sample.stop(&timer), Duration::from_millis(250));

        let value = timer.record_fn(|| {
            clock.add(Duration::from_millis(750));
            42
        });
        assert_eq!(value, 42);
        assert_eq!(timer.count(), 2);
        assert_eq!(timer.total_time(TimeUnit::Seconds), 1.0);
    }

    #[test]
    fn percentiles_in_base_unit() {
        let clock = Arc::new(MockClock::new());
        let config = DistributionConfig {
            percentiles: Some(vec![0.5]),
            service_level_objectives: Some(vec![TimeUnit::Milliseconds.to_nanos(100.0)]),
            ..DistributionConfig::none()
        };
        let timer = timer(&clock, config);
        for millis in 1..=100 {
            timer.record(Duration::from_millis(millis));
        }
        timer.record(Duration::from_secs(5));

        let p50 = timer
            .percentile(0.5, TimeUnit::Milliseconds)
            .expect("valid percentile");
        assert!((p50 - 51.0).abs() < 3.0, "{}", p50);

        let snapshot = timer.take_snapshot();
        assert_eq!(snapshot.count(), 101);
        assert_eq!(snapshot.max(), 5.0);
        let bucket = snapshot.histogram_counts()[0];
        assert!((bucket.bucket - 0.1).abs() < 1e-12);
        assert_eq!(bucket.count, 100);
        assert!((snapshot.percentile_values()[0].value - 0.051).abs() < 0.003);
    }
}
