// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::error::ConfigError;
use crate::histogram::MAX_PRECISION;

use std::cmp::Ordering;
use std::time::Duration;

/// Describes how a distribution (timer or summary) is tracked. Every field is
/// optional so that a meter level config can be layered over registry level
/// defaults with `merge`. A field set on the more specific config wins.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DistributionConfig {
    pub percentile_histogram: Option<bool>,
    pub percentiles: Option<Vec<f64>>,
    pub percentile_precision: Option<u32>,
    pub service_level_objectives: Option<Vec<f64>>,
    pub minimum_expected_value: Option<f64>,
    pub maximum_expected_value: Option<f64>,
    pub expiry: Option<Duration>,
    pub buffer_length: Option<usize>,
}

impl DistributionConfig {
    /// A config with every field unset.
    pub fn none() -> Self {
        Self::default()
    }

    /// The fallback used beneath every registry default.
    pub fn default_config() -> Self {
        Self {
            percentile_histogram: Some(false),
            percentiles: None,
            percentile_precision: Some(1),
            service_level_objectives: None,
            minimum_expected_value: Some(1.0),
            maximum_expected_value: Some(f64::INFINITY),
            expiry: Some(Duration::from_secs(120)),
            buffer_length: Some(3),
        }
    }

    /// Fill every unset field from `parent`.
    pub fn merge(&self, parent: &DistributionConfig) -> DistributionConfig {
        DistributionConfig {
            percentile_histogram: self.percentile_histogram.or(parent.percentile_histogram),
            percentiles: self
                .percentiles
                .clone()
                .or_else(|| parent.percentiles.clone()),
            percentile_precision: self.percentile_precision.or(parent.percentile_precision),
            service_level_objectives: self
                .service_level_objectives
                .clone()
                .or_else(|| parent.service_level_objectives.clone()),
            minimum_expected_value: self
                .minimum_expected_value
                .or(parent.minimum_expected_value),
            maximum_expected_value: self
                .maximum_expected_value
                .or(parent.maximum_expected_value),
            expiry: self.expiry.or(parent.expiry),
            buffer_length: self.buffer_length.or(parent.buffer_length),
        }
    }

    /// Check the fields which are set. Unset fields are not an error here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(buffer_length) = self.buffer_length {
            if buffer_length == 0 {
                return Err(ConfigError::BufferLength(buffer_length));
            }
        }
        if let Some(percentiles) = &self.percentiles {
            for p in percentiles {
                if !(0.0..=1.0).contains(p) {
                    return Err(ConfigError::Percentile(*p));
                }
            }
        }
        if let Some(precision) = self.percentile_precision {
            if precision > MAX_PRECISION {
                return Err(ConfigError::Precision(precision));
            }
        }
        if let Some(min) = self.minimum_expected_value {
            if !(min > 0.0) {
                return Err(ConfigError::MinimumExpectedValue(min));
            }
        }
        if let Some(max) = self.maximum_expected_value {
            if !(max > 0.0) {
                return Err(ConfigError::MaximumExpectedValue(max));
            }
        }
        if let (Some(min), Some(max)) = (self.minimum_expected_value, self.maximum_expected_value) {
            if min > max {
                return Err(ConfigError::ExpectedRange { min, max });
            }
        }
        if let Some(slos) = &self.service_level_objectives {
            for slo in slos {
                if !(*slo > 0.0) {
                    return Err(ConfigError::ServiceLevelObjective(*slo));
                }
            }
        }
        Ok(())
    }

    pub fn is_percentile_histogram(&self) -> bool {
        self.percentile_histogram.unwrap_or(false)
    }

    pub fn is_publishing_percentiles(&self) -> bool {
        self.percentiles.as_ref().map_or(false, |p| !p.is_empty())
    }

    pub fn is_publishing_histogram(&self) -> bool {
        self.is_percentile_histogram()
            || self
                .service_level_objectives
                .as_ref()
                .map_or(false, |s| !s.is_empty())
    }

    /// The fixed bucket boundaries a histogram built from this config keeps
    /// exact counts for, sorted and de-duplicated. The preset percentile
    /// histogram buckets are only included when the backend can aggregate
    /// them.
    pub fn histogram_buckets(&self, supports_aggregable_percentiles: bool) -> Vec<f64> {
        let mut buckets = Vec::new();

        if self.is_percentile_histogram() && supports_aggregable_percentiles {
            let min = self.minimum_expected_value.unwrap_or(0.0);
            let max = self.maximum_expected_value.unwrap_or(f64::INFINITY);
            buckets.extend(
                percentile_histogram_buckets()
                    .into_iter()
                    .filter(|b| *b >= min && *b <= max),
            );
        }

        if let Some(slos) = &self.service_level_objectives {
            buckets.extend(slos.iter().copied());
        }

        buckets.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        buckets.dedup();
        buckets
    }
}

/// The preset boundaries used for a percentile histogram: 1, 2, 3, then each
/// power of four followed by three linear steps towards the next, up to
/// `i64::MAX`.
pub fn percentile_histogram_buckets() -> Vec<f64> {
    let mut buckets: Vec<f64> = vec![1.0, 2.0, 3.0];

    let mut exp = 2;
    while exp < 62 {
        let mut current: i64 = 1 << exp;
        let delta = current / 3;
        let next = (current << 2) - delta;

        while current < next {
            buckets.push(current as f64);
            current += delta;
        }
        exp += 2;
    }
    buckets.push(i64::MAX as f64);
    buckets
}
