// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Meters which read their state from a function instead of being recorded
//! into.

use super::{Id, Measurement, Statistic, Temporality, TimeUnit};

use datastructures::{Clock, ConfigError};
use parking_lot::Mutex;

use std::sync::Arc;

pub(crate) type Source = Box<dyn Fn() -> f64 + Send + Sync>;

struct StepState {
    position: u64,
    baseline: f64,
    previous: f64,
}

/// Turns a monotonically increasing function into the increase over the
/// last completed step.
struct StepFunction {
    clock: Arc<dyn Clock>,
    step: u64,
    state: Mutex<StepState>,
}

impl StepFunction {
    fn new(
        clock: &Arc<dyn Clock>,
        temporality: Temporality,
        initial: f64,
    ) -> Result<Option<Self>, ConfigError> {
        match temporality {
            Temporality::Cumulative => Ok(None),
            Temporality::Step(step) => {
                let millis = step.as_millis() as u64;
                if millis == 0 {
                    return Err(ConfigError::Step(step));
                }
                Ok(Some(Self {
                    clock: clock.clone(),
                    step: millis,
                    state: Mutex::new(StepState {
                        position: clock.wall_time() / millis,
                        baseline: initial,
                        previous: 0.0,
                    }),
                }))
            }
        }
    }

    fn poll(&self, source: &Source) -> f64 {
        let position = self.clock.wall_time() / self.step;
        let mut state = self.state.lock();
        if position > state.position {
            let current = source();
            state.previous = if position == state.position + 1 {
                (current - state.baseline).max(0.0)
            } else {
                0.0
            };
            state.baseline = current;
            state.position = position;
        }
        state.previous
    }
}

/// A counter whose count is read from a monotonically increasing function.
pub struct FunctionCounter {
    id: Id,
    count: Source,
    step: Option<StepFunction>,
}

impl FunctionCounter {
    pub(crate) fn new(
        id: Id,
        clock: &Arc<dyn Clock>,
        temporality: Temporality,
        count: Source,
    ) -> Result<Self, ConfigError> {
        let step = StepFunction::new(clock, temporality, count())?;
        Ok(Self { id, count, step })
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn count(&self) -> f64 {
        match &self.step {
            Some(step) => step.poll(&self.count),
            None => (self.count)(),
        }
    }

    pub(crate) fn measure(&self) -> Vec<Measurement> {
        vec![Measurement::new(Statistic::Count, self.count())]
    }
}

/// A timer whose count and total time are read from functions.
pub struct FunctionTimer {
    id: Id,
    count: Source,
    total: Source,
    total_unit: TimeUnit,
    base_unit: TimeUnit,
    steps: Option<(StepFunction, StepFunction)>,
}

impl FunctionTimer {
    pub(crate) fn new(
        id: Id,
        clock: &Arc<dyn Clock>,
        temporality: Temporality,
        base_unit: TimeUnit,
        count: Source,
        total: Source,
        total_unit: TimeUnit,
    ) -> Result<Self, ConfigError> {
        let steps = match (
            StepFunction::new(clock, temporality, count())?,
            StepFunction::new(clock, temporality, total())?,
        ) {
            (Some(count), Some(total)) => Some((count, total)),
            _ => None,
        };
        Ok(Self {
            id,
            count,
            total,
            total_unit,
            base_unit,
            steps,
        })
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn count(&self) -> f64 {
        match &self.steps {
            Some((count, _)) => count.poll(&self.count),
            None => (self.count)(),
        }
    }

    pub fn total_time(&self, unit: TimeUnit) -> f64 {
        let total = match &self.steps {
            Some((_, total)) => total.poll(&self.total),
            None => (self.total)(),
        };
        self.total_unit.convert(total, unit)
    }

    pub fn mean(&self, unit: TimeUnit) -> f64 {
        let count = self.count();
        if count > 0.0 {
            self.total_time(unit) / count
        } else {
            0.0
        }
    }

    pub(crate) fn measure(&self) -> Vec<Measurement> {
        vec![
            Measurement::new(Statistic::Count, self.count()),
            Measurement::new(Statistic::TotalTime, self.total_time(self.base_unit)),
        ]
    }
}

/// A gauge which reports an amount of time.
pub struct TimeGauge {
    id: Id,
    value: Source,
    unit: TimeUnit,
    base_unit: TimeUnit,
}

impl TimeGauge {
    pub(crate) fn new(id: Id, base_unit: TimeUnit, value: Source, unit: TimeUnit) -> Self {
        Self {
            id,
            value,
            unit,
            base_unit,
        }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn value(&self, unit: TimeUnit) -> f64 {
        self.unit.convert((self.value)(), unit)
    }

    pub(crate) fn measure(&self) -> Vec<Measurement> {
        vec![Measurement::new(Statistic::Value, self.value(self.base_unit))]
    }
}

/// A meter reporting whatever measurements its function returns.
pub struct CustomMeter {
    id: Id,
    measurements: Box<dyn Fn() -> Vec<Measurement> + Send + Sync>,
}

impl CustomMeter {
    pub(crate) fn new(
        id: Id,
        measurements: Box<dyn Fn() -> Vec<Measurement> + Send + Sync>,
    ) -> Self {
        Self { id, measurements }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub(crate) fn measure(&self) -> Vec<Measurement> {
        (self.measurements)()
    }
}
