// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::atomic::AtomicF64;
use crate::counter::Counter;

use std::sync::atomic::Ordering;

/// The accumulated state of one rotation phase: log-linear bucket counts,
/// exact counts for each fixed boundary, and the running total and max.
pub(crate) struct Phase {
    buckets: Vec<Counter>,
    fixed: Vec<Counter>,
    total: AtomicF64,
    max: AtomicF64,
}

impl Phase {
    pub fn new(buckets: usize, fixed: usize) -> Self {
        Self {
            buckets: (0..buckets).map(|_| Counter::default()).collect(),
            fixed: (0..fixed).map(|_| Counter::default()).collect(),
            total: AtomicF64::default(),
            max: AtomicF64::default(),
        }
    }

    /// Add one sample already resolved to its bucket and, if any, its fixed
    /// boundary.
    pub fn record(&self, value: f64, index: usize, fixed: Option<usize>) {
        if let Some(bucket) = self.buckets.get(index) {
            bucket.incr(1);
        }
        if let Some(bucket) = fixed.and_then(|i| self.fixed.get(i)) {
            bucket.incr(1);
        }
        self.total.fetch_add(value, Ordering::Relaxed);
        self.max.fetch_max(value, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        for bucket in self.buckets.iter().chain(self.fixed.iter()) {
            bucket.clear();
        }
        self.total.store(0.0, Ordering::Relaxed);
        self.max.store(0.0, Ordering::Relaxed);
    }

    /// Add this phase onto a merged view.
    pub fn merge_into(&self, merged: &mut Merged) {
        for (sum, bucket) in merged.buckets.iter_mut().zip(self.buckets.iter()) {
            *sum += bucket.get();
        }
        for (sum, bucket) in merged.fixed.iter_mut().zip(self.fixed.iter()) {
            *sum += bucket.get();
        }
        merged.total += self.total.load(Ordering::Relaxed);
        merged.max = merged.max.max(self.max.load(Ordering::Relaxed));
    }

    /// Add only the log-linear counts onto `counts`.
    pub fn merge_buckets(&self, counts: &mut [u64]) {
        for (sum, bucket) in counts.iter_mut().zip(self.buckets.iter()) {
            *sum += bucket.get();
        }
    }
}

/// Plain, non-atomic sum of a set of phases.
#[derive(Debug, Default)]
pub(crate) struct Merged {
    pub buckets: Vec<u64>,
    pub fixed: Vec<u64>,
    pub total: f64,
    pub max: f64,
}

impl Merged {
    pub fn new(buckets: usize, fixed: usize) -> Self {
        Self {
            buckets: vec![0; buckets],
            fixed: vec![0; fixed],
            total: 0.0,
            max: 0.0,
        }
    }

    pub fn count(&self) -> u64 {
        self.buckets.iter().sum()
    }
}
