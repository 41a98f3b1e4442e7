// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use super::{Tally, Temporality};

use datastructures::{
    AtomicF64, Clock, ConfigError, Counter, Distribution, DistributionConfig, Histogram,
    HistogramError, HistogramOptions, HistogramSnapshot, NoopHistogram, TimeWindowHistogram,
    TimeWindowMax,
};

use std::sync::Arc;

/// The state shared by timers and distribution summaries: count, total, a
/// decaying max and, when percentiles or buckets are published, a rotating
/// window histogram.
pub(crate) struct DistributionRecorder {
    count: Tally<Counter>,
    total: Tally<AtomicF64>,
    max: TimeWindowMax,
    histogram: Box<dyn Histogram>,
}

impl DistributionRecorder {
    /// `config` must be fully merged.
    pub fn new(
        clock: &Arc<dyn Clock>,
        temporality: Temporality,
        config: &DistributionConfig,
        options: HistogramOptions,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let histogram: Box<dyn Histogram> =
            if config.is_publishing_percentiles() || config.is_publishing_histogram() {
                Box::new(TimeWindowHistogram::new(clock.clone(), config, options)?)
            } else {
                Box::new(NoopHistogram)
            };

        let expiry = config.expiry.ok_or(ConfigError::Missing("expiry"))?;
        let buffer_length = config
            .buffer_length
            .ok_or(ConfigError::Missing("buffer length"))?;

        Ok(Self {
            count: Tally::new(clock, temporality)?,
            total: Tally::new(clock, temporality)?,
            max: TimeWindowMax::new(clock.clone(), expiry, buffer_length)?,
            histogram,
        })
    }

    /// Negative and non-finite amounts are ignored.
    pub fn record(&self, amount: f64) {
        if !amount.is_finite() || amount < 0.0 {
            return;
        }
        self.count.add(1);
        self.total.add(amount);
        self.max.record(amount);
        self.histogram.record(amount);
    }

    pub fn count(&self) -> u64 {
        self.count.poll()
    }

    pub fn total(&self) -> f64 {
        self.total.poll()
    }

    pub fn max(&self) -> f64 {
        self.max.poll()
    }

    pub fn percentile(&self, percentile: f64) -> Result<f64, HistogramError> {
        self.histogram.percentile(percentile)
    }

    pub fn histogram_count_at_value(&self, value: f64) -> u64 {
        self.histogram.histogram_count_at_value(value)
    }

    pub fn take_snapshot(&self) -> HistogramSnapshot {
        let distribution = Distribution {
            count: self.count(),
            total: self.total(),
            max: self.max(),
        };
        self.histogram.take_snapshot_with(distribution)
    }
}
