// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

mod bucket;
mod function;
mod phase;
mod snapshot;
mod window;

pub use self::bucket::{Layout, MAX_PRECISION};
pub use self::function::BucketFunction;
pub use self::snapshot::*;
pub use self::window::{HistogramOptions, TimeWindowHistogram};

use crate::error::HistogramError;

/// A set of common functions for all `Histogram` types
pub trait Histogram: Send + Sync {
    /// Record a single sample. Non-finite values are dropped.
    fn record(&self, value: f64);
    /// Calculate the percentile (0.0-1.0)
    fn percentile(&self, percentile: f64) -> Result<f64, HistogramError>;
    /// Return the number of samples at or below the bucket holding the value
    fn histogram_count_at_value(&self, value: f64) -> u64;
    /// Snapshot using the count, total and max tracked by the histogram
    fn take_snapshot(&self) -> HistogramSnapshot;
    /// Snapshot using a count, total and max tracked elsewhere
    fn take_snapshot_with(&self, distribution: Distribution) -> HistogramSnapshot;
}

pub(crate) fn check_percentile(percentile: f64) -> Result<(), HistogramError> {
    if (0.0..=1.0).contains(&percentile) {
        Ok(())
    } else {
        Err(HistogramError::InvalidPercentile(percentile))
    }
}

/// Stands in for a histogram when a distribution publishes neither
/// percentiles nor buckets.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHistogram;

impl Histogram for NoopHistogram {
    fn record(&self, _value: f64) {}

    fn percentile(&self, percentile: f64) -> Result<f64, HistogramError> {
        check_percentile(percentile)?;
        Ok(0.0)
    }

    fn histogram_count_at_value(&self, _value: f64) -> u64 {
        0
    }

    fn take_snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot::default()
    }

    fn take_snapshot_with(&self, distribution: Distribution) -> HistogramSnapshot {
        HistogramSnapshot::empty(distribution)
    }
}
