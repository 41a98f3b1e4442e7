// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use serde_derive::Serialize;

/// Count, total and max of a distribution, as tracked by the meter that owns
/// the histogram.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Distribution {
    pub count: u64,
    pub total: f64,
    pub max: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ValueAtPercentile {
    pub percentile: f64,
    pub value: f64,
}

/// Number of samples at or below `bucket`, or within the bucket alone when
/// the histogram was built without cumulative counts.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CountAtBucket {
    pub bucket: f64,
    pub count: u64,
}

/// An immutable read of a histogram at one point in time.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct HistogramSnapshot {
    count: u64,
    total: f64,
    max: f64,
    percentile_values: Vec<ValueAtPercentile>,
    histogram_counts: Vec<CountAtBucket>,
}

impl HistogramSnapshot {
    pub fn new(
        distribution: Distribution,
        percentile_values: Vec<ValueAtPercentile>,
        histogram_counts: Vec<CountAtBucket>,
    ) -> Self {
        Self {
            count: distribution.count,
            total: distribution.total,
            max: distribution.max,
            percentile_values,
            histogram_counts,
        }
    }

    /// A snapshot carrying only the distribution.
    pub fn empty(distribution: Distribution) -> Self {
        Self::new(distribution, Vec::new(), Vec::new())
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }

    pub fn percentile_values(&self) -> &[ValueAtPercentile] {
        &self.percentile_values
    }

    pub fn histogram_counts(&self) -> &[CountAtBucket] {
        &self.histogram_counts
    }

    /// The same snapshot with every value and bucket boundary multiplied by
    /// `factor`. Counts are unchanged.
    pub fn scaled(&self, factor: f64) -> HistogramSnapshot {
        HistogramSnapshot {
            count: self.count,
            total: self.total * factor,
            max: self.max * factor,
            percentile_values: self
                .percentile_values
                .iter()
                .map(|v| ValueAtPercentile {
                    percentile: v.percentile,
                    value: v.value * factor,
                })
                .collect(),
            histogram_counts: self
                .histogram_counts
                .iter()
                .map(|c| CountAtBucket {
                    bucket: c.bucket * factor,
                    count: c.count,
                })
                .collect(),
        }
    }

    /// The reported minimum, approximated by the value at the 0th
    /// percentile when one was requested.
    pub fn min(&self) -> Option<f64> {
        self.percentile_values
            .iter()
            .find(|v| v.percentile == 0.0)
            .map(|v| v.value)
    }
}
