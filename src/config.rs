// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Configuration of the load generator, read from a TOML file and overridden
//! by command line flags.

use crate::meter::{Temporality, TimeUnit};
use crate::naming::NamingConvention;

use clap::{App, Arg, ArgMatches};
use datastructures::{BucketFunction, ConfigError, DistributionConfig};
use log::{info, LevelFilter};
use serde_derive::Deserialize;

use std::io::Read;
use std::process;
use std::time::Duration;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    general: General,
    #[serde(default)]
    distribution: Distribution,
    #[serde(default)]
    workload: Workload,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Output {
    Log,
    Json,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Cumulative,
    Step,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct General {
    #[serde(default = "default_interval")]
    interval: u64,
    #[serde(default = "default_windows")]
    windows: Option<usize>,
    #[serde(default = "default_threads")]
    threads: usize,
    rate: Option<usize>,
    #[serde(default = "default_output")]
    output: Output,
    #[serde(default)]
    naming: NamingConvention,
    #[serde(default = "default_aggregation")]
    aggregation: Aggregation,
    #[serde(default)]
    common_tags: Vec<(String, String)>,
    #[serde(skip, default = "default_logging")]
    logging: LevelFilter,
}

impl Default for General {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            windows: default_windows(),
            threads: default_threads(),
            rate: None,
            output: default_output(),
            naming: NamingConvention::default(),
            aggregation: default_aggregation(),
            common_tags: Vec::new(),
            logging: default_logging(),
        }
    }
}

fn default_interval() -> u64 {
    10
}

fn default_windows() -> Option<usize> {
    Some(5)
}

fn default_threads() -> usize {
    1
}

fn default_output() -> Output {
    Output::Log
}

fn default_aggregation() -> Aggregation {
    Aggregation::Cumulative
}

fn default_logging() -> LevelFilter {
    LevelFilter::Info
}

/// Registry wide distribution defaults. Unset fields fall back to the
/// library defaults.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Distribution {
    percentiles: Option<Vec<f64>>,
    percentile_histogram: Option<bool>,
    precision: Option<u32>,
    /// Seconds.
    expiry: Option<u64>,
    buffer_length: Option<usize>,
}

/// Service level objective boundaries given as a series.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
pub enum Buckets {
    Linear { start: f64, width: f64, count: usize },
    Exponential { start: f64, factor: f64, count: usize },
}

impl Buckets {
    pub fn boundaries(&self) -> Result<Vec<f64>, ConfigError> {
        let function = match *self {
            Buckets::Linear {
                start,
                width,
                count,
            } => BucketFunction::linear(start, width, count)?,
            Buckets::Exponential {
                start,
                factor,
                count,
            } => BucketFunction::exponential(start, factor, count)?,
        };
        Ok(function.boundaries())
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Workload {
    #[serde(default = "default_timers")]
    timers: usize,
    #[serde(default = "default_summaries")]
    summaries: usize,
    #[serde(default = "default_counters")]
    counters: usize,
    #[serde(default = "default_meters_min")]
    meters_min: usize,
    #[serde(default = "default_meters_max")]
    meters_max: usize,
    /// Milliseconds.
    #[serde(default = "default_latency_median")]
    latency_median: f64,
    #[serde(default = "default_sigma")]
    latency_sigma: f64,
    /// Milliseconds.
    latency_slo: Option<Buckets>,
    #[serde(default = "default_size_median")]
    size_median: f64,
    #[serde(default = "default_sigma")]
    size_sigma: f64,
    size_slo: Option<Buckets>,
}

impl Default for Workload {
    fn default() -> Self {
        Self {
            timers: default_timers(),
            summaries: default_summaries(),
            counters: default_counters(),
            meters_min: default_meters_min(),
            meters_max: default_meters_max(),
            latency_median: default_latency_median(),
            latency_sigma: default_sigma(),
            latency_slo: None,
            size_median: default_size_median(),
            size_sigma: default_sigma(),
            size_slo: None,
        }
    }
}

fn default_timers() -> usize {
    8
}

fn default_summaries() -> usize {
    4
}

fn default_counters() -> usize {
    4
}

fn default_meters_min() -> usize {
    1
}

fn default_meters_max() -> usize {
    4
}

fn default_latency_median() -> f64 {
    10.0
}

fn default_size_median() -> f64 {
    1024.0
}

fn default_sigma() -> f64 {
    0.5
}

impl Config {
    /// parse command line options and return `Config`
    pub fn new() -> Config {
        let app = App::new(NAME)
            .version(VERSION)
            .author("Brian Martin <bmartin@twitter.com>")
            .about("Synthetic load for time window histograms and meter publishing")
            .arg(
                Arg::with_name("config")
                    .long("config")
                    .value_name("FILE")
                    .help("TOML config file")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name("verbose")
                    .short("v")
                    .long("verbose")
                    .help("Increase verbosity by one level. Can be used more than once")
                    .multiple(true),
            )
            .arg(
                Arg::with_name("interval")
                    .long("interval")
                    .value_name("Seconds")
                    .help("Publish interval and step length")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name("windows")
                    .long("windows")
                    .value_name("Count")
                    .help("The number of intervals before exit")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name("threads")
                    .long("threads")
                    .value_name("# Threads")
                    .help("The number of threads recording samples")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name("rate")
                    .long("rate")
                    .value_name("Per-second")
                    .help("Iterations per-second for each thread")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name("output")
                    .long("output")
                    .value_name("NAME")
                    .help("Where meters are published")
                    .possible_value("log")
                    .possible_value("json")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name("service")
                    .long("service")
                    .help("Run with unlimited windows"),
            );

        let matches = app.get_matches();

        let mut config = if let Some(file) = matches.value_of("config") {
            Config::load_from_file(file)
        } else {
            println!("NOTE: using builtin base configuration");
            Default::default()
        };

        if let Some(interval) = parse_numeric_arg(&matches, "interval") {
            config.general.interval = interval as u64;
        }

        if let Some(windows) = parse_numeric_arg(&matches, "windows") {
            config.general.windows = Some(windows);
        }

        if let Some(threads) = parse_numeric_arg(&matches, "threads") {
            config.general.threads = threads;
        }

        if let Some(rate) = parse_numeric_arg(&matches, "rate") {
            config.general.rate = Some(rate);
        }

        if let Some(output) = matches.value_of("output") {
            config.general.output = match output {
                "json" => Output::Json,
                _ => Output::Log,
            };
        }

        if matches.is_present("service") {
            config.general.windows = None;
        }

        config.general.logging = match matches.occurrences_of("verbose") {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        if let Err(e) = config.validate() {
            println!("ERROR: {}", e);
            process::exit(1);
        }

        config
    }

    fn load_from_file(filename: &str) -> Config {
        let mut content = String::new();
        let read = std::fs::File::open(filename).and_then(|mut f| f.read_to_string(&mut content));
        if let Err(e) = read {
            println!("ERROR: failed to read config file {}: {}", filename, e);
            process::exit(1);
        }
        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                println!("ERROR: failed to parse config file {}: {}", filename, e);
                process::exit(1);
            }
        }
    }

    /// Check everything that is only caught once meters are built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.general.interval == 0 {
            return Err(ConfigError::Step(Duration::from_secs(0)));
        }
        self.distribution_config().validate()?;
        self.latency_config()?.validate()?;
        self.size_config()?.validate()?;
        Ok(())
    }

    /// the duration of each publish window
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.general.interval)
    }

    pub fn windows(&self) -> Option<usize> {
        self.general.windows
    }

    pub fn threads(&self) -> usize {
        self.general.threads
    }

    pub fn rate(&self) -> Option<usize> {
        self.general.rate
    }

    pub fn output(&self) -> Output {
        self.general.output
    }

    pub fn naming(&self) -> NamingConvention {
        self.general.naming
    }

    pub fn logging(&self) -> LevelFilter {
        self.general.logging
    }

    pub fn common_tags(&self) -> &[(String, String)] {
        &self.general.common_tags
    }

    pub fn temporality(&self) -> Temporality {
        match self.general.aggregation {
            Aggregation::Cumulative => Temporality::Cumulative,
            Aggregation::Step => Temporality::Step(self.interval()),
        }
    }

    /// The registry default distribution config.
    pub fn distribution_config(&self) -> DistributionConfig {
        let distribution = &self.distribution;
        DistributionConfig {
            percentile_histogram: distribution.percentile_histogram,
            percentiles: distribution.percentiles.clone(),
            percentile_precision: distribution.precision,
            expiry: distribution.expiry.map(Duration::from_secs),
            buffer_length: distribution.buffer_length,
            ..DistributionConfig::none()
        }
    }

    /// Config of each latency timer. Objectives are converted from
    /// milliseconds into the nanoseconds timers record.
    pub fn latency_config(&self) -> Result<DistributionConfig, ConfigError> {
        let slos = match &self.workload.latency_slo {
            Some(buckets) => Some(
                buckets
                    .boundaries()?
                    .into_iter()
                    .map(|ms| TimeUnit::Milliseconds.to_nanos(ms))
                    .collect(),
            ),
            None => None,
        };
        Ok(DistributionConfig {
            service_level_objectives: slos,
            ..DistributionConfig::none()
        })
    }

    /// Config of each size summary.
    pub fn size_config(&self) -> Result<DistributionConfig, ConfigError> {
        let slos = match &self.workload.size_slo {
            Some(buckets) => Some(buckets.boundaries()?),
            None => None,
        };
        Ok(DistributionConfig {
            service_level_objectives: slos,
            ..DistributionConfig::none()
        })
    }

    pub fn timers(&self) -> usize {
        self.workload.timers
    }

    pub fn summaries(&self) -> usize {
        self.workload.summaries
    }

    pub fn counters(&self) -> usize {
        self.workload.counters
    }

    /// Inclusive bounds on how many meters each iteration records into.
    pub fn meters_per_iteration(&self) -> (usize, usize) {
        (self.workload.meters_min, self.workload.meters_max)
    }

    /// Median and shape of the log-normal latencies, in milliseconds.
    pub fn latency(&self) -> (f64, f64) {
        (self.workload.latency_median, self.workload.latency_sigma)
    }

    /// Median and shape of the log-normal sizes.
    pub fn size(&self) -> (f64, f64) {
        (self.workload.size_median, self.workload.size_sigma)
    }

    pub fn print(&self) {
        info!("-----");
        let windows = self
            .windows()
            .map(|v| format!("{}", v))
            .unwrap_or_else(|| "Unlimited".to_string());
        info!(
            "Config: Interval: {} seconds Windows: {} Aggregation: {:?}",
            self.general.interval, windows, self.general.aggregation
        );
        info!(
            "Config: Threads: {} Rate (/s): {} Output: {:?} Naming: {}",
            self.threads(),
            self.rate()
                .map(|v| format!("{}", v))
                .unwrap_or_else(|| "Unlimited".to_string()),
            self.output(),
            self.naming(),
        );
        info!(
            "Config: Meters: Timers: {} Summaries: {} Counters: {} Per-Iteration: {}-{}",
            self.timers(),
            self.summaries(),
            self.counters(),
            self.workload.meters_min,
            self.workload.meters_max,
        );
        info!(
            "Config: Percentiles: {:?} Histogram: {}",
            self.distribution.percentiles.as_deref().unwrap_or(&[]),
            self.distribution.percentile_histogram.unwrap_or(false),
        );
    }
}

/// a helper function to parse a numeric argument by name from `ArgMatches`
fn parse_numeric_arg(matches: &ArgMatches, key: &str) -> Option<usize> {
    matches.value_of(key).map(|f| {
        f.parse().unwrap_or_else(|_| {
            println!("ERROR: could not parse {}", key);
            process::exit(1);
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config: Config = toml::from_str("").expect("empty config");
        assert_eq!(config.interval(), Duration::from_secs(10));
        assert_eq!(config.windows(), Some(5));
        assert_eq!(config.output(), Output::Log);
        assert_eq!(config.naming(), NamingConvention::Dot);
        assert_eq!(config.temporality(), Temporality::Cumulative);
        assert_eq!(config.distribution_config(), DistributionConfig::none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse() {
        let config: Config = toml::from_str(
            r#"
            [general]
            interval = 60
            windows = 2
            output = "json"
            naming = "snake"
            aggregation = "step"
            common_tags = [["region", "east"]]

            [distribution]
            percentiles = [0.5, 0.99]
            expiry = 120
            buffer_length = 4

            [workload]
            timers = 2
            latency_slo = { linear = { start = 10.0, width = 10.0, count = 3 } }
            size_slo = { exponential = { start = 1.0, factor = 2.0, count = 4 } }
            "#,
        )
        .expect("valid config");

        assert_eq!(config.output(), Output::Json);
        assert_eq!(config.naming(), NamingConvention::Snake);
        assert_eq!(
            config.temporality(),
            Temporality::Step(Duration::from_secs(60))
        );
        assert_eq!(
            config.common_tags(),
            &[("region".to_string(), "east".to_string())]
        );
        assert_eq!(config.timers(), 2);
        assert_eq!(config.summaries(), 4);

        let distribution = config.distribution_config();
        assert_eq!(distribution.percentiles, Some(vec![0.5, 0.99]));
        assert_eq!(distribution.expiry, Some(Duration::from_secs(120)));
        assert_eq!(distribution.buffer_length, Some(4));

        let latency = config.latency_config().expect("valid slo");
        assert_eq!(
            latency.service_level_objectives,
            Some(vec![10_000_000.0, 20_000_000.0, 30_000_000.0])
        );
        let size = config.size_config().expect("valid slo");
        assert_eq!(size.service_level_objectives, Some(vec![1.0, 2.0, 4.0, 8.0]));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects() {
        assert!(toml::from_str::<Config>("[general]\nintervals = 5").is_err());

        let config: Config =
            toml::from_str("[distribution]\npercentiles = [1.5]").expect("parses");
        assert_eq!(config.validate(), Err(ConfigError::Percentile(1.5)));

        let config: Config = toml::from_str(
            "[workload]\nsize_slo = { linear = { start = 1.0, width = 0.0, count = 3 } }",
        )
        .expect("parses");
        assert!(config.validate().is_err());
    }
}
