// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::clock::{saturating_millis, Clock};
use crate::config::DistributionConfig;
use crate::error::{ConfigError, HistogramError};
use crate::histogram::bucket::Layout;
use crate::histogram::phase::{Merged, Phase};
use crate::histogram::snapshot::*;
use crate::histogram::{check_percentile, Histogram};

use log::*;
use parking_lot::{RwLock, RwLockWriteGuard};

use std::sync::Arc;

/// Backend capabilities which change what a histogram tracks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HistogramOptions {
    /// Include the preset percentile histogram boundaries when the config
    /// asks for a percentile histogram.
    pub supports_aggregable_percentiles: bool,
    /// Report each fixed boundary with the count of every sample at or below
    /// it, rather than only the samples between it and the previous one.
    pub cumulative_bucket_counts: bool,
    /// Add a `+inf` boundary which every sample lands in.
    pub infinity_bucket: bool,
}

impl Default for HistogramOptions {
    fn default() -> Self {
        Self {
            supports_aggregable_percentiles: false,
            cumulative_bucket_counts: true,
            infinity_bucket: false,
        }
    }
}

// Everything guarded by the rotation lock. Recording and reading hold it
// shared, rotation holds it exclusively, so no reader or writer can ever
// observe a phase while it is being cleared.
struct Ring {
    phases: Vec<Phase>,
    current: usize,
    last_rotation: u64,
}

impl Ring {
    // Number of phases which have aged out as of `now`, up to every phase.
    fn stale(&self, now: u64, width: u64) -> usize {
        let steps = now.saturating_sub(self.last_rotation) / width;
        steps.min(self.phases.len() as u64) as usize
    }

    fn rotate(&mut self, now: u64, width: u64) {
        let steps = now.saturating_sub(self.last_rotation) / width;
        if steps == 0 {
            return;
        }
        let n = self.phases.len();
        let clears = steps.min(n as u64) as usize;
        for _ in 0..clears {
            self.current = (self.current + 1) % n;
            self.phases[self.current].clear();
        }
        self.last_rotation += steps * width;
        trace!(
            "rotated {} phases, current phase {} started at {}",
            steps,
            self.current,
            self.last_rotation
        );
    }

    // Phases which still hold unexpired samples, newest first.
    fn live(&self, now: u64, width: u64) -> impl Iterator<Item = &Phase> {
        let n = self.phases.len();
        let live = n - self.stale(now, width);
        let current = self.current;
        (0..live).map(move |j| &self.phases[(current + n - j) % n])
    }
}

/// A histogram which only reports samples recorded within the last `expiry`.
///
/// The window is split into `buffer_length` phases of `expiry /
/// buffer_length` each. Every sample is recorded into the current phase, and
/// once a phase is older than one phase width the oldest phase is cleared and
/// becomes the current one. Reads merge the live phases on demand and never
/// modify the window.
pub struct TimeWindowHistogram {
    clock: Arc<dyn Clock>,
    layout: Layout,
    boundaries: Vec<f64>,
    percentiles: Vec<f64>,
    cumulative: bool,
    width: u64,
    ring: RwLock<Ring>,
}

impl TimeWindowHistogram {
    /// Build a histogram from a fully merged config. Every field the window
    /// depends on must be set.
    pub fn new(
        clock: Arc<dyn Clock>,
        config: &DistributionConfig,
        options: HistogramOptions,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let expiry = config.expiry.ok_or(ConfigError::Missing("expiry"))?;
        let buffer_length = config
            .buffer_length
            .ok_or(ConfigError::Missing("buffer length"))?;
        let min = config
            .minimum_expected_value
            .ok_or(ConfigError::Missing("minimum expected value"))?;
        let max = config
            .maximum_expected_value
            .ok_or(ConfigError::Missing("maximum expected value"))?;
        let precision = config
            .percentile_precision
            .ok_or(ConfigError::Missing("percentile precision"))?;

        let width = saturating_millis(expiry) / buffer_length as u64;
        if width == 0 {
            return Err(ConfigError::PhaseWidth {
                expiry,
                buffer_length,
            });
        }

        let mut boundaries = config.histogram_buckets(options.supports_aggregable_percentiles);
        if options.infinity_bucket && boundaries.last() != Some(&f64::INFINITY) {
            boundaries.push(f64::INFINITY);
        }

        let layout = Layout::new(min, max, precision);
        let phases = (0..buffer_length)
            .map(|_| Phase::new(layout.buckets(), boundaries.len()))
            .collect();

        debug!(
            "time window histogram: {} phases of {}ms, {} buckets, {} fixed boundaries",
            buffer_length,
            width,
            layout.buckets(),
            boundaries.len()
        );

        let ring = Ring {
            phases,
            current: 0,
            last_rotation: clock.wall_time(),
        };

        Ok(Self {
            clock,
            layout,
            boundaries,
            percentiles: config.percentiles.clone().unwrap_or_default(),
            cumulative: options.cumulative_bucket_counts,
            width,
            ring: RwLock::new(ring),
        })
    }

    /// Width of one phase in milliseconds.
    pub fn phase_width(&self) -> u64 {
        self.width
    }

    pub fn buffer_length(&self) -> usize {
        self.ring.read().phases.len()
    }

    /// The fixed boundaries counted exactly, in ascending order.
    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    /// Number of phases whose samples have not yet aged out, newest included.
    /// Never below one: once every phase has aged out the next current phase
    /// is live, just empty until the next record rotates into it.
    pub fn live_phases(&self) -> usize {
        let now = self.clock.wall_time();
        let ring = self.ring.read();
        (ring.phases.len() - ring.stale(now, self.width)).max(1)
    }

    // Smallest boundary at or above the value.
    fn fixed_index(&self, value: f64) -> Option<usize> {
        let index = self.boundaries.partition_point(|b| *b < value);
        if index < self.boundaries.len() {
            Some(index)
        } else {
            None
        }
    }

    fn merged(&self) -> Merged {
        let now = self.clock.wall_time();
        let mut merged = Merged::new(self.layout.buckets(), self.boundaries.len());
        let ring = self.ring.read();
        for phase in ring.live(now, self.width) {
            phase.merge_into(&mut merged);
        }
        merged
    }

    fn merged_buckets(&self) -> Vec<u64> {
        let now = self.clock.wall_time();
        let mut counts = vec![0; self.layout.buckets()];
        let ring = self.ring.read();
        for phase in ring.live(now, self.width) {
            phase.merge_buckets(&mut counts);
        }
        counts
    }

    fn snapshot_of(&self, merged: &Merged, distribution: Distribution) -> HistogramSnapshot {
        let percentile_values = self
            .percentiles
            .iter()
            .map(|p| ValueAtPercentile {
                percentile: *p,
                value: self.layout.percentile(&merged.buckets, *p),
            })
            .collect();

        let mut running = 0;
        let histogram_counts = self
            .boundaries
            .iter()
            .zip(merged.fixed.iter())
            .map(|(bucket, count)| {
                running += count;
                CountAtBucket {
                    bucket: *bucket,
                    count: if self.cumulative { running } else { *count },
                }
            })
            .collect();

        HistogramSnapshot::new(distribution, percentile_values, histogram_counts)
    }
}

impl Histogram for TimeWindowHistogram {
    fn record(&self, value: f64) {
        if !value.is_finite() {
            return;
        }
        let index = self.layout.index(value);
        let fixed = self.fixed_index(value);

        let now = self.clock.wall_time();
        let mut ring = self.ring.read();
        if now.saturating_sub(ring.last_rotation) >= self.width {
            drop(ring);
            let mut writer = self.ring.write();
            writer.rotate(now, self.width);
            ring = RwLockWriteGuard::downgrade(writer);
        }
        ring.phases[ring.current].record(value, index, fixed);
    }

    fn percentile(&self, percentile: f64) -> Result<f64, HistogramError> {
        check_percentile(percentile)?;
        Ok(self.layout.percentile(&self.merged_buckets(), percentile))
    }

    fn histogram_count_at_value(&self, value: f64) -> u64 {
        self.layout.count_at_value(&self.merged_buckets(), value)
    }

    fn take_snapshot(&self) -> HistogramSnapshot {
        let merged = self.merged();
        let distribution = Distribution {
            count: merged.count(),
            total: merged.total,
            max: merged.max,
        };
        self.snapshot_of(&merged, distribution)
    }

    fn take_snapshot_with(&self, distribution: Distribution) -> HistogramSnapshot {
        self.snapshot_of(&self.merged(), distribution)
    }
}
