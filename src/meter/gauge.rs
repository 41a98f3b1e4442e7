// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use super::{Id, Measurement, Statistic};

/// Reports the instantaneous value of a function each time it is read.
pub struct Gauge {
    id: Id,
    value: Box<dyn Fn() -> f64 + Send + Sync>,
}

impl Gauge {
    pub(crate) fn new(id: Id, value: Box<dyn Fn() -> f64 + Send + Sync>) -> Self {
        Self { id, value }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    /// May be NaN when the observed value is no longer available.
    pub fn value(&self) -> f64 {
        (self.value)()
    }

    pub(crate) fn measure(&self) -> Vec<Measurement> {
        vec![Measurement::new(Statistic::Value, self.value())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn follows_source() {
        let source = Arc::new(AtomicU64::new(3));
        let observed = source.clone();
        let gauge = Gauge::new(
            Id::new("queue.size", &[]),
            Box::new(move || observed.load(Ordering::Relaxed) as f64),
        );
        assert_eq!(gauge.value(), 3.0);
        source.store(8, Ordering::Relaxed);
        assert_eq!(gauge.measure(), vec![Measurement::new(Statistic::Value, 8.0)]);
    }
}
