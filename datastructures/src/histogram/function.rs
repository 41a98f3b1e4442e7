// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::error::ConfigError;

/// Maps an observed value onto a fixed series of bucket boundaries, either
/// evenly spaced or growing geometrically.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BucketFunction {
    Linear { start: f64, width: f64, count: usize },
    Exponential { start: f64, factor: f64, count: usize },
}

impl BucketFunction {
    /// Boundaries `start, start + width, ..` for `count` buckets.
    pub fn linear(start: f64, width: f64, count: usize) -> Result<Self, ConfigError> {
        if !start.is_finite() {
            return Err(ConfigError::BucketFunction("start must be finite"));
        }
        if !(width > 0.0) || !width.is_finite() {
            return Err(ConfigError::BucketFunction("width must be positive"));
        }
        if count == 0 {
            return Err(ConfigError::BucketFunction("count must be positive"));
        }
        Ok(BucketFunction::Linear {
            start,
            width,
            count,
        })
    }

    /// Boundaries `start, start * factor, ..` for `count` buckets.
    pub fn exponential(start: f64, factor: f64, count: usize) -> Result<Self, ConfigError> {
        if !(start > 0.0) || !start.is_finite() {
            return Err(ConfigError::BucketFunction("start must be positive"));
        }
        if !(factor > 1.0) || !factor.is_finite() {
            return Err(ConfigError::BucketFunction("factor must be greater than one"));
        }
        if count == 0 {
            return Err(ConfigError::BucketFunction("count must be positive"));
        }
        Ok(BucketFunction::Exponential {
            start,
            factor,
            count,
        })
    }

    pub fn count(&self) -> usize {
        match self {
            BucketFunction::Linear { count, .. } | BucketFunction::Exponential { count, .. } => {
                *count
            }
        }
    }

    /// The boundary at `index`, which must be less than `count()`.
    pub fn boundary(&self, index: usize) -> f64 {
        match *self {
            BucketFunction::Linear { start, width, .. } => start + width * index as f64,
            BucketFunction::Exponential { start, factor, .. } => start * factor.powi(index as i32),
        }
    }

    pub fn boundaries(&self) -> Vec<f64> {
        (0..self.count()).map(|i| self.boundary(i)).collect()
    }

    /// Returns the smallest boundary that is greater than or equal to the
    /// value, or positive infinity when the value is past the last boundary.
    /// Values at or below the first boundary map to the first boundary. NaN
    /// has no bucket and is returned unchanged.
    pub fn bucket(&self, value: f64) -> f64 {
        if value.is_nan() {
            return value;
        }
        let first = self.boundary(0);
        if value <= first {
            return first;
        }

        let estimate = match *self {
            BucketFunction::Linear { start, width, .. } => ((value - start) / width).ceil(),
            BucketFunction::Exponential { start, factor, .. } => {
                ((value / start).ln() / factor.ln()).ceil()
            }
        };
        if !(estimate < self.count() as f64) {
            return self.settle(self.count() - 1, value);
        }
        self.settle(estimate as usize, value)
    }

    // Correct a floating point estimate of the bucket index by at most one
    // step in either direction.
    fn settle(&self, mut index: usize, value: f64) -> f64 {
        if index > 0 && self.boundary(index - 1) >= value {
            index -= 1;
        }
        if self.boundary(index) >= value {
            self.boundary(index)
        } else if index + 1 < self.count() {
            self.boundary(index + 1)
        } else {
            f64::INFINITY
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear() {
        let function = BucketFunction::linear(0.0, 10.0, 5).expect("valid function");
        assert_eq!(function.boundaries(), vec![0.0, 10.0, 20.0, 30.0, 40.0]);
        assert_eq!(function.bucket(-5.0), 0.0);
        assert_eq!(function.bucket(0.0), 0.0);
        assert_eq!(function.bucket(0.1), 10.0);
        assert_eq!(function.bucket(10.0), 10.0);
        assert_eq!(function.bucket(39.9), 40.0);
        assert_eq!(function.bucket(40.0), 40.0);
        assert_eq!(function.bucket(40.1), f64::INFINITY);
        assert_eq!(function.bucket(f64::MAX), f64::INFINITY);
    }

    #[test]
    fn linear_fractional_width() {
        let function = BucketFunction::linear(0.0, 0.1, 10).expect("valid function");
        for i in 1..10 {
            let boundary = function.boundary(i);
            assert_eq!(function.bucket(boundary), boundary);
        }
        assert_eq!(function.bucket(0.3), function.boundary(3));
    }

    #[test]
    fn exponential() {
        let function = BucketFunction::exponential(1.0, 2.0, 4).expect("valid function");
        assert_eq!(function.boundaries(), vec![1.0, 2.0, 4.0, 8.0]);
        assert_eq!(function.bucket(0.5), 1.0);
        assert_eq!(function.bucket(1.5), 2.0);
        assert_eq!(function.bucket(4.0), 4.0);
        assert_eq!(function.bucket(5.0), 8.0);
        assert_eq!(function.bucket(9.0), f64::INFINITY);
    }

    #[test]
    fn monotonic() {
        let function = BucketFunction::exponential(0.001, 1.5, 40).expect("valid function");
        let mut previous = 0.0;
        let mut value = 0.0001;
        while value < 1e9 {
            let bucket = function.bucket(value);
            assert!(bucket >= value);
            assert!(bucket >= previous);
            previous = bucket;
            value *= 1.07;
        }
    }

    #[test]
    fn invalid() {
        assert!(BucketFunction::linear(0.0, 0.0, 5).is_err());
        assert!(BucketFunction::linear(f64::NAN, 1.0, 5).is_err());
        assert!(BucketFunction::linear(0.0, 1.0, 0).is_err());
        assert!(BucketFunction::exponential(0.0, 2.0, 5).is_err());
        assert!(BucketFunction::exponential(1.0, 1.0, 5).is_err());
        assert!(BucketFunction::exponential(1.0, 2.0, 0).is_err());
    }
}
