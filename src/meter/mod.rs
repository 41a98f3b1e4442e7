// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The meter kinds a registry can hold.

mod counter;
mod distribution;
mod function;
mod gauge;
mod id;
mod long_task;
mod summary;
mod timer;

pub use self::counter::Counter;
pub use self::function::{CustomMeter, FunctionCounter, FunctionTimer, TimeGauge};
pub use self::gauge::Gauge;
pub use self::id::{Id, Tag};
pub use self::long_task::{LongTaskSample, LongTaskTimer};
pub use self::summary::DistributionSummary;
pub use self::timer::{Timer, TimerSample};

pub(crate) use self::distribution::DistributionRecorder;

use datastructures::{Accumulator, Clock, ConfigError, HistogramSnapshot, StepValue};
use serde_derive::Serialize;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

use std::sync::Arc;
use std::time::Duration;

#[derive(
    Clone, Copy, Debug, EnumIter, EnumString, Eq, Hash, IntoStaticStr, PartialEq, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MeterType {
    #[strum(serialize = "counter")]
    Counter,
    #[strum(serialize = "gauge")]
    Gauge,
    #[strum(serialize = "timer")]
    Timer,
    #[strum(serialize = "distribution_summary")]
    DistributionSummary,
    #[strum(serialize = "long_task_timer")]
    LongTaskTimer,
    #[strum(serialize = "time_gauge")]
    TimeGauge,
    #[strum(serialize = "function_counter")]
    FunctionCounter,
    #[strum(serialize = "function_timer")]
    FunctionTimer,
    #[strum(serialize = "other")]
    Other,
}

impl std::fmt::Display for MeterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name: &'static str = self.into();
        write!(f, "{}", name)
    }
}

/// What a single measurement of a meter represents.
#[derive(
    Clone, Copy, Debug, EnumIter, EnumString, Eq, Hash, IntoStaticStr, PartialEq, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    #[strum(serialize = "count")]
    Count,
    #[strum(serialize = "total")]
    Total,
    #[strum(serialize = "total_time")]
    TotalTime,
    #[strum(serialize = "max")]
    Max,
    #[strum(serialize = "value")]
    Value,
    #[strum(serialize = "active_tasks")]
    ActiveTasks,
    #[strum(serialize = "duration")]
    Duration,
}

impl std::fmt::Display for Statistic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name: &'static str = self.into();
        write!(f, "{}", name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Measurement {
    pub statistic: Statistic,
    pub value: f64,
}

impl Measurement {
    pub fn new(statistic: Statistic, value: f64) -> Self {
        Self { statistic, value }
    }
}

/// Whether counts and totals accumulate for the life of the meter or are
/// reported per step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Temporality {
    Cumulative,
    Step(Duration),
}

impl Default for Temporality {
    fn default() -> Self {
        Temporality::Cumulative
    }
}

#[derive(Clone, Copy, Debug, EnumIter, EnumString, Eq, Hash, IntoStaticStr, PartialEq)]
pub enum TimeUnit {
    #[strum(serialize = "nanoseconds")]
    Nanoseconds,
    #[strum(serialize = "microseconds")]
    Microseconds,
    #[strum(serialize = "milliseconds")]
    Milliseconds,
    #[strum(serialize = "seconds")]
    Seconds,
}

impl TimeUnit {
    pub fn nanos(self) -> f64 {
        match self {
            TimeUnit::Nanoseconds => 1.0,
            TimeUnit::Microseconds => 1_000.0,
            TimeUnit::Milliseconds => 1_000_000.0,
            TimeUnit::Seconds => 1_000_000_000.0,
        }
    }

    /// Express an amount of nanoseconds in this unit.
    pub fn from_nanos(self, nanos: f64) -> f64 {
        nanos / self.nanos()
    }

    /// Express an amount of this unit in nanoseconds.
    pub fn to_nanos(self, amount: f64) -> f64 {
        amount * self.nanos()
    }

    /// Convert an amount of this unit into `unit`.
    pub fn convert(self, amount: f64, unit: TimeUnit) -> f64 {
        amount * self.nanos() / unit.nanos()
    }
}

impl std::fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name: &'static str = self.into();
        write!(f, "{}", name)
    }
}

pub(crate) fn duration_nanos(duration: Duration) -> f64 {
    duration.as_nanos() as f64
}

/// A count or total which is either cumulative or reset every step.
pub(crate) enum Tally<A: Accumulator> {
    Cumulative(A),
    Step(StepValue<A>),
}

impl<A: Accumulator> Tally<A> {
    pub fn new(clock: &Arc<dyn Clock>, temporality: Temporality) -> Result<Self, ConfigError> {
        match temporality {
            Temporality::Cumulative => Ok(Tally::Cumulative(A::default())),
            Temporality::Step(step) => Ok(Tally::Step(StepValue::new(clock.clone(), step)?)),
        }
    }

    pub fn add(&self, value: A::Value) {
        match self {
            Tally::Cumulative(a) => a.add(value),
            Tally::Step(s) => s.add(value),
        }
    }

    pub fn poll(&self) -> A::Value {
        match self {
            Tally::Cumulative(a) => a.load(),
            Tally::Step(s) => s.poll(),
        }
    }
}

/// Every kind of meter, each shared behind an `Arc`.
#[derive(Clone)]
pub enum Meter {
    Counter(Arc<Counter>),
    Gauge(Arc<Gauge>),
    Timer(Arc<Timer>),
    DistributionSummary(Arc<DistributionSummary>),
    LongTaskTimer(Arc<LongTaskTimer>),
    TimeGauge(Arc<TimeGauge>),
    FunctionCounter(Arc<FunctionCounter>),
    FunctionTimer(Arc<FunctionTimer>),
    Other(Arc<CustomMeter>),
}

macro_rules! meter_accessor {
    ($name:ident, $variant:ident, $ty:ty) => {
        pub fn $name(&self) -> Option<Arc<$ty>> {
            match self {
                Meter::$variant(m) => Some(m.clone()),
                _ => None,
            }
        }
    };
}

impl Meter {
    pub fn id(&self) -> &Id {
        match self {
            Meter::Counter(m) => m.id(),
            Meter::Gauge(m) => m.id(),
            Meter::Timer(m) => m.id(),
            Meter::DistributionSummary(m) => m.id(),
            Meter::LongTaskTimer(m) => m.id(),
            Meter::TimeGauge(m) => m.id(),
            Meter::FunctionCounter(m) => m.id(),
            Meter::FunctionTimer(m) => m.id(),
            Meter::Other(m) => m.id(),
        }
    }

    pub fn meter_type(&self) -> MeterType {
        match self {
            Meter::Counter(_) => MeterType::Counter,
            Meter::Gauge(_) => MeterType::Gauge,
            Meter::Timer(_) => MeterType::Timer,
            Meter::DistributionSummary(_) => MeterType::DistributionSummary,
            Meter::LongTaskTimer(_) => MeterType::LongTaskTimer,
            Meter::TimeGauge(_) => MeterType::TimeGauge,
            Meter::FunctionCounter(_) => MeterType::FunctionCounter,
            Meter::FunctionTimer(_) => MeterType::FunctionTimer,
            Meter::Other(_) => MeterType::Other,
        }
    }

    /// Current measurements, in the meter's base unit.
    pub fn measure(&self) -> Vec<Measurement> {
        match self {
            Meter::Counter(m) => m.measure(),
            Meter::Gauge(m) => m.measure(),
            Meter::Timer(m) => m.measure(),
            Meter::DistributionSummary(m) => m.measure(),
            Meter::LongTaskTimer(m) => m.measure(),
            Meter::TimeGauge(m) => m.measure(),
            Meter::FunctionCounter(m) => m.measure(),
            Meter::FunctionTimer(m) => m.measure(),
            Meter::Other(m) => m.measure(),
        }
    }

    /// The distribution snapshot of timers and summaries.
    pub fn snapshot(&self) -> Option<HistogramSnapshot> {
        match self {
            Meter::Timer(m) => Some(m.take_snapshot()),
            Meter::DistributionSummary(m) => Some(m.take_snapshot()),
            Meter::Counter(_)
            | Meter::Gauge(_)
            | Meter::LongTaskTimer(_)
            | Meter::TimeGauge(_)
            | Meter::FunctionCounter(_)
            | Meter::FunctionTimer(_)
            | Meter::Other(_) => None,
        }
    }

    meter_accessor!(as_counter, Counter, Counter);
    meter_accessor!(as_gauge, Gauge, Gauge);
    meter_accessor!(as_timer, Timer, Timer);
    meter_accessor!(as_summary, DistributionSummary, DistributionSummary);
    meter_accessor!(as_long_task_timer, LongTaskTimer, LongTaskTimer);
    meter_accessor!(as_time_gauge, TimeGauge, TimeGauge);
    meter_accessor!(as_function_counter, FunctionCounter, FunctionCounter);
    meter_accessor!(as_function_timer, FunctionTimer, FunctionTimer);
    meter_accessor!(as_custom, Other, CustomMeter);
}

impl std::fmt::Debug for Meter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.meter_type(), self.id())
    }
}
