// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::filter::{CommonTags, FilterReply, MeterFilter};
use crate::meter::*;

use datastructures::{Clock, ConfigError, DistributionConfig, HistogramOptions};
use log::debug;
use parking_lot::RwLock;
use thiserror::Error;

use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("meter {name} is already registered as a {existing}, not a {requested}")]
    TypeConflict {
        name: String,
        existing: MeterType,
        requested: MeterType,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Registry wide settings.
#[derive(Clone)]
pub struct RegistryConfig {
    /// Cumulative, or per step for registries which push deltas.
    pub temporality: Temporality,
    /// The unit timers report in.
    pub base_time_unit: TimeUnit,
    /// Added to every meter id which does not already carry the key. Applied
    /// as a filter ahead of `filters`.
    pub common_tags: Vec<Tag>,
    /// Applied in order to every meter before it is registered or looked up.
    pub filters: Vec<Arc<dyn MeterFilter>>,
    /// Merged beneath the config of every timer and summary.
    pub distribution: DistributionConfig,
    pub histogram_options: HistogramOptions,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            temporality: Temporality::Cumulative,
            base_time_unit: TimeUnit::Seconds,
            common_tags: Vec::new(),
            filters: Vec::new(),
            distribution: DistributionConfig::none(),
            histogram_options: HistogramOptions::default(),
        }
    }
}

impl std::fmt::Debug for RegistryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryConfig")
            .field("temporality", &self.temporality)
            .field("base_time_unit", &self.base_time_unit)
            .field("common_tags", &self.common_tags)
            .field("filters", &self.filters.len())
            .field("distribution", &self.distribution)
            .field("histogram_options", &self.histogram_options)
            .finish()
    }
}

/// Holds the meters of an application, creating each the first time its id
/// is asked for and handing back the same meter afterwards.
///
/// A meter denied by a filter is still handed back and can be recorded into,
/// but it is never stored and so never published.
pub struct MeterRegistry {
    clock: Arc<dyn Clock>,
    config: RegistryConfig,
    filters: Vec<Arc<dyn MeterFilter>>,
    meters: RwLock<BTreeMap<Id, Meter>>,
}

impl MeterRegistry {
    pub fn new(clock: Arc<dyn Clock>, mut config: RegistryConfig) -> Self {
        if let Temporality::Step(step) = config.temporality {
            if config.distribution.expiry.is_none() {
                config.distribution.expiry = Some(step);
            }
        }
        let mut filters: Vec<Arc<dyn MeterFilter>> = Vec::new();
        if !config.common_tags.is_empty() {
            filters.push(Arc::new(CommonTags::new(config.common_tags.clone())));
        }
        filters.extend(config.filters.iter().cloned());
        Self {
            clock,
            config,
            filters,
            meters: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn counter(&self, id: Id) -> Result<Arc<Counter>, RegistryError> {
        self.register(id, MeterType::Counter, Meter::as_counter, |id| {
            let counter = Counter::new(id, &self.clock, self.config.temporality)?;
            Ok(Meter::Counter(Arc::new(counter)))
        })
    }

    pub fn gauge<F>(&self, id: Id, value: F) -> Result<Arc<Gauge>, RegistryError>
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        self.register(id, MeterType::Gauge, Meter::as_gauge, |id| {
            Ok(Meter::Gauge(Arc::new(Gauge::new(id, Box::new(value)))))
        })
    }

    /// Timer distribution configs are in nanoseconds.
    pub fn timer(&self, id: Id, config: &DistributionConfig) -> Result<Arc<Timer>, RegistryError> {
        self.register(id, MeterType::Timer, Meter::as_timer, |id| {
            let config = self.distribution_config(&id, config, &Timer::default_config());
            let timer = Timer::new(
                id,
                &self.clock,
                self.config.base_time_unit,
                self.config.temporality,
                &config,
                self.config.histogram_options,
            )?;
            Ok(Meter::Timer(Arc::new(timer)))
        })
    }

    pub fn summary(
        &self,
        id: Id,
        config: &DistributionConfig,
    ) -> Result<Arc<DistributionSummary>, RegistryError> {
        self.register(
            id,
            MeterType::DistributionSummary,
            Meter::as_summary,
            |id| {
                let config = self.distribution_config(&id, config, &DistributionConfig::none());
                let summary = DistributionSummary::new(
                    id,
                    &self.clock,
                    self.config.temporality,
                    &config,
                    self.config.histogram_options,
                )?;
                Ok(Meter::DistributionSummary(Arc::new(summary)))
            },
        )
    }

    pub fn long_task_timer(&self, id: Id) -> Result<Arc<LongTaskTimer>, RegistryError> {
        self.register(
            id,
            MeterType::LongTaskTimer,
            Meter::as_long_task_timer,
            |id| {
                let timer = LongTaskTimer::new(id, &self.clock, self.config.base_time_unit);
                Ok(Meter::LongTaskTimer(Arc::new(timer)))
            },
        )
    }

    /// `count` must be monotonically increasing.
    pub fn function_counter<F>(
        &self,
        id: Id,
        count: F,
    ) -> Result<Arc<FunctionCounter>, RegistryError>
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        self.register(
            id,
            MeterType::FunctionCounter,
            Meter::as_function_counter,
            |id| {
                let counter = FunctionCounter::new(
                    id,
                    &self.clock,
                    self.config.temporality,
                    Box::new(count),
                )?;
                Ok(Meter::FunctionCounter(Arc::new(counter)))
            },
        )
    }

    /// `count` and `total` must be monotonically increasing, `total` being
    /// expressed in `total_unit`.
    pub fn function_timer<C, T>(
        &self,
        id: Id,
        count: C,
        total: T,
        total_unit: TimeUnit,
    ) -> Result<Arc<FunctionTimer>, RegistryError>
    where
        C: Fn() -> f64 + Send + Sync + 'static,
        T: Fn() -> f64 + Send + Sync + 'static,
    {
        self.register(
            id,
            MeterType::FunctionTimer,
            Meter::as_function_timer,
            |id| {
                let timer = FunctionTimer::new(
                    id,
                    &self.clock,
                    self.config.temporality,
                    self.config.base_time_unit,
                    Box::new(count),
                    Box::new(total),
                    total_unit,
                )?;
                Ok(Meter::FunctionTimer(Arc::new(timer)))
            },
        )
    }

    pub fn time_gauge<F>(
        &self,
        id: Id,
        value: F,
        unit: TimeUnit,
    ) -> Result<Arc<TimeGauge>, RegistryError>
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        self.register(id, MeterType::TimeGauge, Meter::as_time_gauge, |id| {
            let gauge = TimeGauge::new(id, self.config.base_time_unit, Box::new(value), unit);
            Ok(Meter::TimeGauge(Arc::new(gauge)))
        })
    }

    pub fn custom<F>(&self, id: Id, measurements: F) -> Result<Arc<CustomMeter>, RegistryError>
    where
        F: Fn() -> Vec<Measurement> + Send + Sync + 'static,
    {
        self.register(id, MeterType::Other, Meter::as_custom, |id| {
            Ok(Meter::Other(Arc::new(CustomMeter::new(
                id,
                Box::new(measurements),
            ))))
        })
    }

    /// Look up a meter. Filters are applied to `id` first.
    pub fn get(&self, id: &Id) -> Option<Meter> {
        let id = self.map_id(id.clone());
        self.meters.read().get(&id).cloned()
    }

    /// Remove a meter, returning it. Handles to it stay usable but it is no
    /// longer published.
    pub fn remove(&self, id: &Id) -> Option<Meter> {
        let id = self.map_id(id.clone());
        let removed = self.meters.write().remove(&id);
        if removed.is_some() {
            debug!("removed meter: {}", id);
        }
        removed
    }

    /// Every meter with the given name, whatever its tags.
    pub fn find(&self, name: &str) -> Vec<Meter> {
        self.meters
            .read()
            .values()
            .filter(|m| m.id().name() == name)
            .cloned()
            .collect()
    }

    /// Every meter, ordered by name then tags.
    pub fn meters(&self) -> Vec<Meter> {
        self.meters.read().values().cloned().collect()
    }

    pub fn for_each<F: FnMut(&Meter)>(&self, mut f: F) {
        for meter in self.meters.read().values() {
            f(meter);
        }
    }

    pub fn len(&self) -> usize {
        self.meters.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.meters.read().is_empty()
    }

    fn map_id(&self, id: Id) -> Id {
        let meter_type = id.meter_type();
        self.filters
            .iter()
            .fold(id, |id, filter| filter.map(id))
            .with_meter_type(meter_type)
    }

    fn accepts(&self, id: &Id) -> bool {
        for filter in &self.filters {
            match filter.accept(id) {
                FilterReply::Deny => return false,
                FilterReply::Accept => return true,
                FilterReply::Neutral => {}
            }
        }
        true
    }

    fn distribution_config(
        &self,
        id: &Id,
        config: &DistributionConfig,
        type_defaults: &DistributionConfig,
    ) -> DistributionConfig {
        self.filters
            .iter()
            .fold(config.clone(), |config, filter| filter.configure(id, config))
            .merge(type_defaults)
            .merge(&self.config.distribution)
            .merge(&DistributionConfig::default_config())
    }

    fn register<T, A, B>(
        &self,
        id: Id,
        meter_type: MeterType,
        as_type: A,
        build: B,
    ) -> Result<Arc<T>, RegistryError>
    where
        A: Fn(&Meter) -> Option<Arc<T>>,
        B: FnOnce(Id) -> Result<Meter, RegistryError>,
    {
        let id = self.map_id(id.with_meter_type(meter_type));

        if let Some(meter) = self.meters.read().get(&id) {
            return existing(meter, meter_type, &as_type);
        }

        // built without holding the lock, as function meters call back into
        // user code which may read the registry
        let meter = build(id.clone())?;
        let typed = existing(&meter, meter_type, &as_type)?;

        if !self.accepts(&id) {
            debug!("denied {}: {}", meter_type, id);
            return Ok(typed);
        }

        let mut meters = self.meters.write();
        // another thread may have registered it while the lock was released
        if let Some(meter) = meters.get(&id) {
            return existing(meter, meter_type, &as_type);
        }
        debug!("registered {}: {}", meter_type, id);
        meters.insert(id, meter);
        Ok(typed)
    }
}

fn existing<T, A>(
    meter: &Meter,
    requested: MeterType,
    as_type: A,
) -> Result<Arc<T>, RegistryError>
where
    A: Fn(&Meter) -> Option<Arc<T>>,
{
    as_type(meter).ok_or_else(|| RegistryError::TypeConflict {
        name: meter.id().to_string(),
        existing: meter.meter_type(),
        requested,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::*;
    use datastructures::MockClock;
    use std::thread;
    use std::time::Duration;

    fn filter<F: MeterFilter + 'static>(filter: F) -> Arc<dyn MeterFilter> {
        Arc::new(filter)
    }

    fn registry(config: RegistryConfig) -> (Arc<MockClock>, MeterRegistry) {
        let mock = Arc::new(MockClock::new());
        let clock: Arc<dyn Clock> = mock.clone();
        (mock, MeterRegistry::new(clock, config))
    }

    #[test]
    fn get_or_create() {
        let (_, registry) = registry(RegistryConfig::default());
        let a = registry
            .counter(Id::new("requests", &[("method", "get")]))
            .expect("registered");
        let b = registry
            .counter(Id::new("requests", &[("method", "get")]))
            .expect("registered");
        a.increment();
        b.increment();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.count(), 2.0);
        assert_eq!(registry.len(), 1);

        registry
            .counter(Id::new("requests", &[("method", "put")]))
            .expect("registered");
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.find("requests").len(), 2);
        assert!(registry.find("responses").is_empty());
    }

    #[test]
    fn type_conflict() {
        let (_, registry) = registry(RegistryConfig::default());
        registry
            .counter(Id::new("requests", &[]))
            .expect("registered");
        let error = registry
            .gauge(Id::new("requests", &[]), || 1.0)
            .err()
            .expect("conflict");
        assert_eq!(
            error,
            RegistryError::TypeConflict {
                name: "requests".to_string(),
                existing: MeterType::Counter,
                requested: MeterType::Gauge,
            }
        );
    }

    #[test]
    fn invalid_config() {
        let (_, registry) = registry(RegistryConfig::default());
        let config = DistributionConfig {
            percentiles: Some(vec![1.5]),
            ..DistributionConfig::none()
        };
        let error = registry
            .summary(Id::new("sizes", &[]), &config)
            .err()
            .expect("invalid");
        assert_eq!(error, RegistryError::Config(ConfigError::Percentile(1.5)));
        assert!(registry.is_empty());
    }

    #[test]
    fn common_tags() {
        let config = RegistryConfig {
            common_tags: vec![Tag::new("region", "east"), Tag::new("host", "a")],
            ..RegistryConfig::default()
        };
        let (_, registry) = registry(config);
        let counter = registry
            .counter(Id::new("requests", &[("host", "b")]))
            .expect("registered");
        assert_eq!(counter.id().tag("region"), Some("east"));
        assert_eq!(counter.id().tag("host"), Some("b"));
        assert_eq!(counter.id().meter_type(), MeterType::Counter);

        let found = registry
            .get(&Id::new("requests", &[("host", "b")]))
            .expect("found");
        assert_eq!(found.meter_type(), MeterType::Counter);

        assert!(registry.remove(&Id::new("requests", &[("host", "b")])).is_some());
        assert!(registry.get(&Id::new("requests", &[("host", "b")])).is_none());
        counter.increment();
    }

    #[test]
    fn filters() {
        let config = RegistryConfig {
            common_tags: vec![Tag::new("host", "a")],
            filters: vec![
                filter(deny_name_starts_with("jvm")),
                filter(RenameTag::new("http", "uri", "path")),
                filter(MapId(|id: Id| {
                    let name = id.name().replace("http.server", "http");
                    id.with_name(&name)
                })),
                filter(Configure::max_expected("payload", 1_000.0)),
            ],
            ..RegistryConfig::default()
        };
        let (_, registry) = registry(config);

        let denied = registry
            .counter(Id::new("jvm.gc.pause", &[]))
            .expect("handle");
        denied.increment();
        assert_eq!(denied.count(), 1.0);
        assert!(registry.is_empty());
        assert!(registry.get(&Id::new("jvm.gc.pause", &[])).is_none());

        let requests = registry
            .counter(Id::new("http.server.requests", &[("uri", "/")]))
            .expect("registered");
        assert_eq!(requests.id().to_string(), "http.requests{host=a,path=/}");
        assert!(registry
            .get(&Id::new("http.server.requests", &[("uri", "/")]))
            .is_some());
        assert_eq!(registry.len(), 1);

        let percentiles = DistributionConfig {
            percentiles: Some(vec![1.0]),
            ..DistributionConfig::none()
        };
        let payload = registry
            .summary(Id::new("payload.size", &[]), &percentiles)
            .expect("registered");
        payload.record(5_000.0);
        let top = payload.percentile(1.0).expect("valid percentile");
        // clamped into the top bucket, which ends at the next power of two
        assert!(top > 512.0 && top < 1_024.0, "{}", top);

        let other = registry
            .summary(Id::new("other.size", &[]), &percentiles)
            .expect("registered");
        other.record(5_000.0);
        let top = other.percentile(1.0).expect("valid percentile");
        assert!(top > 4_000.0, "{}", top);
    }

    #[test]
    fn accept_ends_the_decision() {
        let config = RegistryConfig {
            filters: vec![
                filter(accept_name_starts_with("jvm.memory")),
                filter(deny_name_starts_with("jvm")),
            ],
            ..RegistryConfig::default()
        };
        let (_, registry) = registry(config);
        registry
            .gauge(Id::new("jvm.memory.used", &[]), || 1.0)
            .expect("registered");
        registry
            .gauge(Id::new("jvm.threads", &[]), || 1.0)
            .expect("handle");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn function_meters_may_read_the_registry() {
        let (_, registry) = registry(RegistryConfig {
            temporality: Temporality::Step(Duration::from_secs(10)),
            ..RegistryConfig::default()
        });
        let registry = Arc::new(registry);
        registry
            .counter(Id::new("requests", &[]))
            .expect("registered");

        let weak = Arc::downgrade(&registry);
        let meters = registry
            .function_counter(Id::new("meters", &[]), move || {
                weak.upgrade().map(|r| r.len() as f64).unwrap_or(0.0)
            })
            .expect("registered");
        assert_eq!(registry.len(), 2);
        assert_eq!(meters.count(), 0.0);
    }

    #[test]
    fn step_registry() {
        let config = RegistryConfig {
            temporality: Temporality::Step(Duration::from_secs(60)),
            ..RegistryConfig::default()
        };
        let (clock, registry) = registry(config);
        assert_eq!(
            registry.config().distribution.expiry,
            Some(Duration::from_secs(60))
        );

        let timer = registry
            .timer(Id::new("latency", &[]), &DistributionConfig::none())
            .expect("registered");
        timer.record(Duration::from_millis(100));
        assert_eq!(timer.count(), 0);
        assert_eq!(timer.max(TimeUnit::Milliseconds), 100.0);

        clock.add(Duration::from_secs(60));
        assert_eq!(timer.count(), 1);
        assert_eq!(timer.total_time(TimeUnit::Seconds), 0.1);
        // the max decays with the step
        assert_eq!(timer.max(TimeUnit::Milliseconds), 0.0);
    }

    #[test]
    fn measurements() {
        let (_, registry) = registry(RegistryConfig::default());
        registry
            .counter(Id::new("b.requests", &[]))
            .expect("registered")
            .increment_by(3.0);
        registry
            .gauge(Id::new("a.queue", &[]), || 7.0)
            .expect("registered");

        let mut seen = Vec::new();
        registry.for_each(|meter| seen.push((meter.id().name().to_string(), meter.measure())));
        assert_eq!(
            seen,
            vec![
                (
                    "a.queue".to_string(),
                    vec![Measurement::new(Statistic::Value, 7.0)]
                ),
                (
                    "b.requests".to_string(),
                    vec![Measurement::new(Statistic::Count, 3.0)]
                ),
            ]
        );
    }

    #[test]
    fn threaded_access() {
        let (_, registry) = registry(RegistryConfig::default());
        let registry = Arc::new(registry);

        let mut threads = Vec::new();
        for _ in 0..4 {
            let registry = registry.clone();
            threads.push(thread::spawn(move || {
                for i in 0..1_000 {
                    let name = format!("requests.{}", i % 10);
                    registry
                        .counter(Id::new(&name, &[]))
                        .expect("registered")
                        .increment();
                }
            }));
        }

        for thread in threads {
            thread.join().expect("Failed to join child thread");
        }

        assert_eq!(registry.len(), 10);
        let total: f64 = registry
            .meters()
            .iter()
            .filter_map(|m| m.as_counter())
            .map(|c| c.count())
            .sum();
        assert_eq!(total, 4_000.0);
    }
}
