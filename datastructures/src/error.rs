// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::time::Duration;
use thiserror::Error;

/// Rejected distribution or bucket configuration. These are programmer
/// errors and are reported when the histogram or meter is constructed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid distribution configuration: buffer length ({0}) must be greater than zero")]
    BufferLength(usize),
    #[error("invalid distribution configuration: percentiles must be between 0.0 and 1.0, found {0}")]
    Percentile(f64),
    #[error("invalid distribution configuration: percentile precision ({0}) must be at most 3")]
    Precision(u32),
    #[error("invalid distribution configuration: minimum expected value ({0}) must be greater than zero")]
    MinimumExpectedValue(f64),
    #[error("invalid distribution configuration: maximum expected value ({0}) must be greater than zero")]
    MaximumExpectedValue(f64),
    #[error("invalid distribution configuration: maximum expected value ({max}) must be equal to or greater than minimum expected value ({min})")]
    ExpectedRange { min: f64, max: f64 },
    #[error("invalid distribution configuration: service level objectives must be greater than zero, found {0}")]
    ServiceLevelObjective(f64),
    #[error("invalid distribution configuration: expiry ({expiry:?}) / buffer length ({buffer_length}) must be at least one millisecond")]
    PhaseWidth {
        expiry: Duration,
        buffer_length: usize,
    },
    #[error("invalid distribution configuration: {0} must be set")]
    Missing(&'static str),
    #[error("invalid step: {0:?} must be at least one millisecond")]
    Step(Duration),
    #[error("invalid bucket function: {0}")]
    BucketFunction(&'static str),
}

/// Errors from querying a histogram.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum HistogramError {
    #[error("percentile must be between 0.0 and 1.0, found {0}")]
    InvalidPercentile(f64),
}
