// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use super::{Id, Measurement, Statistic, Tally, Temporality};

use datastructures::{AtomicF64, Clock, ConfigError};

use std::sync::Arc;

/// A monotonically increasing count.
pub struct Counter {
    id: Id,
    count: Tally<AtomicF64>,
}

impl Counter {
    pub(crate) fn new(
        id: Id,
        clock: &Arc<dyn Clock>,
        temporality: Temporality,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            id,
            count: Tally::new(clock, temporality)?,
        })
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn increment(&self) {
        self.increment_by(1.0);
    }

    /// Negative and non-finite amounts are ignored.
    pub fn increment_by(&self, amount: f64) {
        if amount.is_finite() && amount >= 0.0 {
            self.count.add(amount);
        }
    }

    /// The cumulative count, or the count over the last completed step.
    pub fn count(&self) -> f64 {
        self.count.poll()
    }

    pub(crate) fn measure(&self) -> Vec<Measurement> {
        vec![Measurement::new(Statistic::Count, self.count())]
    }
}
