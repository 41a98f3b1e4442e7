// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use super::{DistributionRecorder, Id, Measurement, Statistic, Temporality};

use datastructures::{
    Clock, ConfigError, DistributionConfig, HistogramError, HistogramOptions, HistogramSnapshot,
};

use std::sync::Arc;

/// Tracks the distribution of arbitrary amounts, such as payload sizes.
pub struct DistributionSummary {
    id: Id,
    recorder: DistributionRecorder,
}

impl DistributionSummary {
    pub(crate) fn new(
        id: Id,
        clock: &Arc<dyn Clock>,
        temporality: Temporality,
        config: &DistributionConfig,
        options: HistogramOptions,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            id,
            recorder: DistributionRecorder::new(clock, temporality, config, options)?,
        })
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Negative and non-finite amounts are ignored.
    pub fn record(&self, amount: f64) {
        self.recorder.record(amount);
    }

    pub fn count(&self) -> u64 {
        self.recorder.count()
    }

    pub fn total_amount(&self) -> f64 {
        self.recorder.total()
    }

    pub fn max(&self) -> f64 {
        self.recorder.max()
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.total_amount() / count as f64
        }
    }

    pub fn percentile(&self, percentile: f64) -> Result<f64, HistogramError> {
        self.recorder.percentile(percentile)
    }

    pub fn histogram_count_at_value(&self, value: f64) -> u64 {
        self.recorder.histogram_count_at_value(value)
    }

    pub fn take_snapshot(&self) -> HistogramSnapshot {
        self.recorder.take_snapshot()
    }

    pub(crate) fn measure(&self) -> Vec<Measurement> {
        vec![
            Measurement::new(Statistic::Count, self.count() as f64),
            Measurement::new(Statistic::Total, self.total_amount()),
            Measurement::new(Statistic::Max, self.max()),
        ]
    }
}
