// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use meterline::config::{Config, Output};
use meterline::fatal;
use meterline::logger::Logger;
use meterline::*;

use log::{debug, error, info};
use rand::SeedableRng;
use rand_distr::{Distribution, LogNormal};
use rand_xoshiro::Xoshiro256PlusPlus;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The meters workers record into, addressed by a single index.
struct Workload {
    timers: Vec<Arc<Timer>>,
    summaries: Vec<Arc<DistributionSummary>>,
    counters: Vec<Arc<Counter>>,
    iterations: Arc<AtomicU64>,
}

impl Workload {
    fn new(config: &Config, registry: &MeterRegistry) -> Result<Self, RegistryError> {
        let latency = config.latency_config()?;
        let size = config.size_config()?;

        let mut timers = Vec::new();
        for i in 0..config.timers() {
            let meter = i.to_string();
            let id = Id::new("meterline.latency", &[("meter", meter.as_str())])
                .with_description("synthetic request latency");
            timers.push(registry.timer(id, &latency)?);
        }

        let mut summaries = Vec::new();
        for i in 0..config.summaries() {
            let meter = i.to_string();
            let id = Id::new("meterline.size", &[("meter", meter.as_str())])
                .with_base_unit("bytes");
            summaries.push(registry.summary(id, &size)?);
        }

        let mut counters = Vec::new();
        for i in 0..config.counters() {
            let meter = i.to_string();
            let id = Id::new("meterline.events", &[("meter", meter.as_str())]);
            counters.push(registry.counter(id)?);
        }

        let iterations = Arc::new(AtomicU64::new(0));
        let observed = iterations.clone();
        registry.function_counter(Id::new("meterline.iterations", &[]), move || {
            observed.load(Ordering::Relaxed) as f64
        })?;

        Ok(Self {
            timers,
            summaries,
            counters,
            iterations,
        })
    }

    fn len(&self) -> usize {
        self.timers.len() + self.summaries.len() + self.counters.len()
    }
}

pub fn main() {
    let config = Config::new();

    Logger::new()
        .label("meterline")
        .level(config.logging())
        .init()
        .expect("Failed to initialize logger");

    info!("meterline {} initializing...", VERSION);
    config.print();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::default());
    let registry = Arc::new(MeterRegistry::new(
        clock,
        RegistryConfig {
            temporality: config.temporality(),
            common_tags: config
                .common_tags()
                .iter()
                .map(|(k, v)| Tag::new(k, v))
                .collect(),
            distribution: config.distribution_config(),
            ..RegistryConfig::default()
        },
    ));

    let workload = match Workload::new(&config, &registry) {
        Ok(workload) => Arc::new(workload),
        Err(e) => fatal!("failed to register meters: {}", e),
    };

    let run = match registry.long_task_timer(Id::new("meterline.run", &[])) {
        Ok(timer) => timer,
        Err(e) => fatal!("failed to register meters: {}", e),
    };
    let running = run.start();

    let mut push = match config.output() {
        Output::Log => PushLoop::start(
            registry.clone(),
            LogPublisher::new(config.naming()),
            config.interval(),
        ),
        Output::Json => PushLoop::start(
            registry.clone(),
            JsonPublisher::new(std::io::stdout(), config.naming()),
            config.interval(),
        ),
    }
    .unwrap_or_else(|e| fatal!("failed to start publishing: {}", e));

    let control = Arc::new(AtomicBool::new(true));
    let workers = launch_workers(&config, &workload, &control);

    let mut window = 0;
    loop {
        thread::sleep(config.interval());
        window += 1;
        debug!("window {} complete", window);
        if let Some(max_window) = config.windows() {
            if window >= max_window {
                break;
            }
        }
    }

    control.store(false, Ordering::Relaxed);
    for worker in workers {
        if worker.join().is_err() {
            error!("worker thread panicked");
        }
    }
    info!("ran for {:.1} seconds", running.stop().as_secs_f64());
    push.stop();
}

fn launch_workers(
    config: &Config,
    workload: &Arc<Workload>,
    control: &Arc<AtomicBool>,
) -> Vec<JoinHandle<()>> {
    let (latency_median, latency_sigma) = config.latency();
    let latency = LogNormal::new(latency_median.ln(), latency_sigma)
        .unwrap_or_else(|e| fatal!("bad latency distribution: {}", e));
    let (size_median, size_sigma) = config.size();
    let size = LogNormal::new(size_median.ln(), size_sigma)
        .unwrap_or_else(|e| fatal!("bad size distribution: {}", e));

    let options = workload.len();
    let (minimum, maximum) = config.meters_per_iteration();
    let maximum = maximum.min(options);
    let minimum = minimum.min(maximum);
    let pause = config
        .rate()
        .filter(|rate| *rate > 0)
        .map(|rate| Duration::from_secs_f64(1.0 / rate as f64));

    let mut workers = Vec::new();
    for id in 0..config.threads() {
        let workload = workload.clone();
        let control = control.clone();
        let worker = thread::Builder::new()
            .name(format!("worker{}", id))
            .spawn(move || {
                let mut rng = Xoshiro256PlusPlus::seed_from_u64(id as u64);
                while control.load(Ordering::Relaxed) {
                    let chosen = match selection_between(minimum, maximum, options, &mut rng) {
                        Ok(chosen) => chosen,
                        Err(e) => {
                            error!("{}", e);
                            return;
                        }
                    };
                    for index in chosen.iter() {
                        record(&workload, index, &latency, &size, &mut rng);
                    }
                    workload.iterations.fetch_add(1, Ordering::Relaxed);
                    if let Some(pause) = pause {
                        thread::sleep(pause);
                    }
                }
            })
            .unwrap_or_else(|e| fatal!("failed to spawn worker: {}", e));
        workers.push(worker);
    }
    workers
}

fn record(
    workload: &Workload,
    index: usize,
    latency: &LogNormal<f64>,
    size: &LogNormal<f64>,
    rng: &mut Xoshiro256PlusPlus,
) {
    let timers = workload.timers.len();
    let summaries = workload.summaries.len();
    if index < timers {
        let millis = latency.sample(rng);
        workload.timers[index].record_in(millis, TimeUnit::Milliseconds);
    } else if index < timers + summaries {
        workload.summaries[index - timers].record(size.sample(rng).round());
    } else if let Some(counter) = workload.counters.get(index - timers - summaries) {
        // mostly single events with the occasional burst
        let events = mode_uniform_sample(1, 10, 1, 0.8, rng).unwrap_or(1);
        counter.increment_by(events as f64);
    }
}
