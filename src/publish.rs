// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Periodic export of registry contents.

use crate::meter::{Measurement, Meter, MeterType};
use crate::naming::NamingConvention;
use crate::registry::MeterRegistry;

use chrono::{SecondsFormat, Utc};
use datastructures::HistogramSnapshot;
use log::{debug, error, info};
use parking_lot::{Condvar, Mutex};
use serde_derive::Serialize;
use thiserror::Error;

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("failed to write metrics: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode metrics: {0}")]
    Json(#[from] serde_json::Error),
    #[error("metrics rejected: {0}")]
    Rejected(String),
}

/// One meter as handed to a publisher, with its name and tag keys already
/// rendered by the publisher's naming convention.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MeterReport {
    pub name: String,
    pub tags: BTreeMap<String, String>,
    #[serde(rename = "type")]
    pub meter_type: MeterType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_unit: Option<String>,
    pub measurements: Vec<Measurement>,
    /// The value at the 0th percentile, when that percentile is published.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<HistogramSnapshot>,
}

impl MeterReport {
    pub fn new(meter: &Meter, convention: NamingConvention) -> Self {
        let id = meter.id();
        let snapshot = meter.snapshot();
        Self {
            name: convention.name(id.name()),
            tags: id
                .tags()
                .iter()
                .map(|t| (convention.tag_key(t.key()), convention.tag_value(t.value())))
                .collect(),
            meter_type: meter.meter_type(),
            base_unit: id.base_unit().map(|u| u.to_string()),
            measurements: meter.measure(),
            min: snapshot.as_ref().and_then(|s| s.min()),
            snapshot,
        }
    }
}

/// Report every meter in the registry, ordered by id.
pub fn collect(registry: &MeterRegistry, convention: NamingConvention) -> Vec<MeterReport> {
    let mut reports = Vec::with_capacity(registry.len());
    registry.for_each(|meter| reports.push(MeterReport::new(meter, convention)));
    reports
}

/// A backend metrics are pushed to.
pub trait Publisher: Send {
    fn naming_convention(&self) -> NamingConvention {
        NamingConvention::Dot
    }

    fn publish(&mut self, reports: &[MeterReport]) -> Result<(), PublishError>;
}

/// Collect the registry and hand it to the publisher once.
pub fn publish_once<P: Publisher + ?Sized>(
    registry: &MeterRegistry,
    publisher: &mut P,
) -> Result<(), PublishError> {
    let reports = collect(registry, publisher.naming_convention());
    debug!("publishing {} meters", reports.len());
    publisher.publish(&reports)
}

/// Logs one line per meter.
#[derive(Default)]
pub struct LogPublisher {
    convention: NamingConvention,
}

impl LogPublisher {
    pub fn new(convention: NamingConvention) -> Self {
        Self { convention }
    }
}

impl Publisher for LogPublisher {
    fn naming_convention(&self) -> NamingConvention {
        self.convention
    }

    fn publish(&mut self, reports: &[MeterReport]) -> Result<(), PublishError> {
        info!("-----");
        for report in reports {
            let mut line = report.name.clone();
            if !report.tags.is_empty() {
                let tags: Vec<String> = report
                    .tags
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect();
                line.push_str(&format!("{{{}}}", tags.join(",")));
            }
            for measurement in &report.measurements {
                line.push_str(&format!(" {}: {}", measurement.statistic, measurement.value));
            }
            if let Some(snapshot) = &report.snapshot {
                for pv in snapshot.percentile_values() {
                    line.push_str(&format!(" p{}: {:.6}", pv.percentile * 100.0, pv.value));
                }
            }
            info!("{}", line);
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct Document<'a> {
    timestamp: String,
    meters: &'a [MeterReport],
}

/// Writes one JSON document per publish, followed by a newline.
pub struct JsonPublisher<W: Write + Send> {
    writer: W,
    convention: NamingConvention,
}

impl<W: Write + Send> JsonPublisher<W> {
    pub fn new(writer: W, convention: NamingConvention) -> Self {
        Self { writer, convention }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> Publisher for JsonPublisher<W> {
    fn naming_convention(&self) -> NamingConvention {
        self.convention
    }

    fn publish(&mut self, reports: &[MeterReport]) -> Result<(), PublishError> {
        let document = Document {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            meters: reports,
        };
        serde_json::to_writer(&mut self.writer, &document)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Publishes a registry from a background thread every `interval`, with
/// cycles aligned to multiples of the interval on the registry's clock.
///
/// A failed publish is logged and the loop carries on. Stopping, or
/// dropping, the loop publishes one last time before the thread exits.
pub struct PushLoop {
    stop: Arc<(Mutex<bool>, Condvar)>,
    thread: Option<JoinHandle<()>>,
}

impl PushLoop {
    pub fn start<P: Publisher + 'static>(
        registry: Arc<MeterRegistry>,
        mut publisher: P,
        interval: Duration,
    ) -> Result<Self, PublishError> {
        let stop = Arc::new((Mutex::new(false), Condvar::new()));
        let signal = stop.clone();
        let interval_ms = (interval.as_millis() as u64).max(1);

        let thread = thread::Builder::new()
            .name("publish".to_string())
            .spawn(move || {
                let (lock, condvar) = &*signal;
                loop {
                    let now = registry.clock().wall_time();
                    let wait = interval_ms - now % interval_ms;
                    let deadline = Instant::now() + Duration::from_millis(wait);

                    let mut stopped = lock.lock();
                    while !*stopped {
                        if condvar.wait_until(&mut stopped, deadline).timed_out() {
                            break;
                        }
                    }
                    let last = *stopped;
                    drop(stopped);

                    if let Err(e) = publish_once(&registry, &mut publisher) {
                        error!("{}", e);
                    }
                    if last {
                        debug!("publish loop stopped");
                        break;
                    }
                }
            })?;

        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Publish a final time and wait for the thread to exit.
    pub fn stop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let (lock, condvar) = &*self.stop;
            *lock.lock() = true;
            condvar.notify_all();
            if thread.join().is_err() {
                error!("publish thread panicked");
            }
        }
    }
}

impl Drop for PushLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
