// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use super::{Id, Measurement, Statistic, TimeUnit};

use datastructures::Clock;
use log::trace;
use parking_lot::Mutex;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Tracks tasks while they are still running, reporting how many are active
/// and how long they have been running in total.
pub struct LongTaskTimer {
    id: Id,
    clock: Arc<dyn Clock>,
    base_unit: TimeUnit,
    next: AtomicU64,
    // task id to start time in nanoseconds
    tasks: Mutex<BTreeMap<u64, u64>>,
}

impl LongTaskTimer {
    pub(crate) fn new(id: Id, clock: &Arc<dyn Clock>, base_unit: TimeUnit) -> Self {
        Self {
            id,
            clock: clock.clone(),
            base_unit,
            next: AtomicU64::new(0),
            tasks: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Start a task. It stays active until the sample is stopped or dropped.
    pub fn start(&self) -> LongTaskSample<'_> {
        let task = self.next.fetch_add(1, Ordering::Relaxed);
        let start = self.clock.monotonic_time();
        self.tasks.lock().insert(task, start);
        trace!("{}: started task {}", self.id, task);
        LongTaskSample {
            timer: self,
            task,
            start,
            stopped: false,
        }
    }

    pub fn active_tasks(&self) -> usize {
        self.tasks.lock().len()
    }

    /// The summed running time of every active task.
    pub fn duration(&self, unit: TimeUnit) -> f64 {
        let now = self.clock.monotonic_time();
        let nanos: u64 = self
            .tasks
            .lock()
            .values()
            .map(|start| now.saturating_sub(*start))
            .sum();
        unit.from_nanos(nanos as f64)
    }

    /// The running time of the oldest active task.
    pub fn max(&self, unit: TimeUnit) -> f64 {
        let now = self.clock.monotonic_time();
        let nanos = self
            .tasks
            .lock()
            .values()
            .map(|start| now.saturating_sub(*start))
            .max()
            .unwrap_or(0);
        unit.from_nanos(nanos as f64)
    }

    fn finish(&self, task: u64) -> Option<Duration> {
        let start = self.tasks.lock().remove(&task)?;
        let elapsed = self.clock.monotonic_time().saturating_sub(start);
        trace!("{}: finished task {}", self.id, task);
        Some(Duration::from_nanos(elapsed))
    }

    pub(crate) fn measure(&self) -> Vec<Measurement> {
        vec![
            Measurement::new(Statistic::ActiveTasks, self.active_tasks() as f64),
            Measurement::new(Statistic::Duration, self.duration(self.base_unit)),
            Measurement::new(Statistic::Max, self.max(self.base_unit)),
        ]
    }
}

/// A running task. Dropping it stops the task.
pub struct LongTaskSample<'a> {
    timer: &'a LongTaskTimer,
    task: u64,
    start: u64,
    stopped: bool,
}

impl<'a> LongTaskSample<'a> {
    /// How long the task has been running.
    pub fn duration(&self, unit: TimeUnit) -> f64 {
        if self.stopped {
            return 0.0;
        }
        let elapsed = self.timer.clock.monotonic_time().saturating_sub(self.start);
        unit.from_nanos(elapsed as f64)
    }

    /// Stop the task, returning how long it ran.
    pub fn stop(mut self) -> Duration {
        self.stopped = true;
        self.timer.finish(self.task).unwrap_or_default()
    }
}

impl<'a> Drop for LongTaskSample<'a> {
    fn drop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.timer.finish(self.task);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datastructures::MockClock;

    #[test]
    fn active_tasks() {
        let mock = Arc::new(MockClock::new());
        let clock: Arc<dyn Clock> = mock.clone();
        let timer = LongTaskTimer::new(Id::new("compaction", &[]), &clock, TimeUnit::Seconds);

        let first = timer.start();
        mock.add(Duration::from_secs(2));
        let second = timer.start();
        mock.add(Duration::from_secs(1));

        assert_eq!(timer.active_tasks(), 2);
        assert_eq!(timer.duration(TimeUnit::Seconds), 4.0);
        assert_eq!(timer.max(TimeUnit::Seconds), 3.0);
        assert_eq!(second.duration(TimeUnit::Milliseconds), 1_000.0);

        assert_eq!(first.stop(), Duration::from_secs(3));
        assert_eq!(timer.active_tasks(), 1);
        assert_eq!(
            timer.measure(),
            vec![
                Measurement::new(Statistic::ActiveTasks, 1.0),
                Measurement::new(Statistic::Duration, 1.0),
                Measurement::new(Statistic::Max, 1.0),
            ]
        );

        drop(second);
        assert_eq!(timer.active_tasks(), 0);
        assert_eq!(timer.duration(TimeUnit::Seconds), 0.0);
        assert_eq!(timer.max(TimeUnit::Seconds), 0.0);
    }
}
