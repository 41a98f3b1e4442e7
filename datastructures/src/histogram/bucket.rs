// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use log::*;

/// The log-linear bucket layout shared by every phase of a histogram.
///
/// Values are scaled by the unit, which is the minimum expected value. The
/// first outer bucket covers `[0, 1)` in scaled units and every following
/// outer bucket `j` covers `[2^(j-1), 2^j)`. Each outer bucket is split into
/// the same number of linear inner buckets, enough that the width of an inner
/// bucket relative to its lower edge is smaller than the requested number of
/// significant decimal digits.
#[derive(Clone, Debug, PartialEq)]
pub struct Layout {
    unit: f64,
    precision: u32,
    inner_buckets: usize,
    outer_buckets: usize,
}

/// The largest number of significant digits that can be requested.
pub const MAX_PRECISION: u32 = 3;

// Largest power of two a layout covers above its unit.
const MAX_POWER: usize = 64;

impl Layout {
    /// Create a layout covering `[0, max]` with `precision` significant
    /// digits for values of at least `min`. Arguments must already be
    /// validated: `0 < min <= max` and `precision <= MAX_PRECISION`.
    pub fn new(min: f64, max: f64, precision: u32) -> Self {
        let precision = precision.min(MAX_PRECISION);
        let inner_buckets = (2 * 10_usize.pow(precision)).next_power_of_two() / 2;

        let ratio = max / min;
        let powers = if ratio.is_finite() {
            (ratio.log2().ceil().max(1.0) as usize).min(MAX_POWER)
        } else {
            MAX_POWER
        };
        let outer_buckets = powers + 1;

        trace!(
            "histogram layout: unit {} powers {} inner buckets {}",
            min,
            powers,
            inner_buckets
        );

        Self {
            unit: min,
            precision,
            inner_buckets,
            outer_buckets,
        }
    }

    /// Total number of buckets.
    pub fn buckets(&self) -> usize {
        self.inner_buckets * self.outer_buckets
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Largest value which is not clamped into the top bucket.
    pub fn highest_trackable(&self) -> f64 {
        self.unit * 2_f64.powi((self.outer_buckets - 1) as i32)
    }

    /// Index of the bucket holding the value. Negative values belong to the
    /// first bucket and values past the top of the layout to the last one.
    /// Callers drop NaN before this point.
    pub fn index(&self, value: f64) -> usize {
        let scaled = value / self.unit;
        if !(scaled > 0.0) {
            return 0;
        }
        if scaled < 1.0 {
            let inner = (scaled * self.inner_buckets as f64) as usize;
            return inner.min(self.inner_buckets - 1);
        }
        if !scaled.is_finite() {
            return self.buckets() - 1;
        }

        // floor(log2(scaled)) read from the exponent bits, exact for normal
        // values which every scaled value >= 1 is
        let exponent = ((scaled.to_bits() >> 52) & 0x7ff) as usize - 1023;
        let outer = exponent + 1;
        if outer >= self.outer_buckets {
            return self.buckets() - 1;
        }

        let lower = 2_f64.powi(exponent as i32);
        let fraction = scaled / lower - 1.0;
        let inner = ((fraction * self.inner_buckets as f64) as usize).min(self.inner_buckets - 1);
        outer * self.inner_buckets + inner
    }

    /// Lower and upper edge of the bucket at `index`.
    pub fn bounds(&self, index: usize) -> (f64, f64) {
        let outer = index / self.inner_buckets;
        let inner = (index % self.inner_buckets) as f64;
        let width = self.inner_buckets as f64;
        if outer == 0 {
            (
                inner / width * self.unit,
                (inner + 1.0) / width * self.unit,
            )
        } else {
            let base = 2_f64.powi(outer as i32 - 1) * self.unit;
            (
                base * (1.0 + inner / width),
                base * (1.0 + (inner + 1.0) / width),
            )
        }
    }

    /// Value reported for samples in the bucket at `index`.
    pub fn value(&self, index: usize) -> f64 {
        let (low, high) = self.bounds(index);
        low + (high - low) / 2.0
    }

    /// Percentile over a full set of merged bucket counts. An empty
    /// histogram reports zero.
    pub fn percentile(&self, counts: &[u64], percentile: f64) -> f64 {
        let samples: u64 = counts.iter().sum();
        if samples == 0 {
            return 0.0;
        }
        let need = ((samples as f64 * percentile).ceil() as u64).max(1);
        let mut have = 0;
        for (index, count) in counts.iter().enumerate() {
            have += count;
            if have >= need {
                return self.value(index);
            }
        }
        self.value(counts.len() - 1)
    }

    /// Number of samples in every bucket up to and including the one holding
    /// the value.
    pub fn count_at_value(&self, counts: &[u64], value: f64) -> u64 {
        if value.is_nan() || value < 0.0 {
            return 0;
        }
        let index = self.index(value);
        counts.iter().take(index + 1).sum()
    }
}
