// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Concurrent building blocks for time based aggregation: rotating window
//! histograms, decaying maxima and step aligned accumulators.

mod atomic;
mod clock;
mod config;
mod counter;
mod error;
mod histogram;
mod max;
mod step;

pub use crate::atomic::AtomicF64;
pub use crate::clock::{Clock, MockClock, SystemClock};
pub use crate::config::{percentile_histogram_buckets, DistributionConfig};
pub use crate::counter::Counter;
pub use crate::error::{ConfigError, HistogramError};
pub use crate::histogram::*;
pub use crate::max::TimeWindowMax;
pub use crate::step::{Accumulator, StepCounter, StepDouble, StepValue};
