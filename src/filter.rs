// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Filters which a registry applies to every meter as it is registered.
//! They can deny a meter, rewrite its id, or adjust its distribution config.
//! Filters run in the order they were added.

use crate::meter::{Id, MeterType, Tag};

use datastructures::DistributionConfig;

use std::time::Duration;

/// The decision of one filter about whether a meter is registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterReply {
    /// Do not register the meter, and stop asking later filters.
    Deny,
    /// Leave the decision to later filters.
    Neutral,
    /// Register the meter, and stop asking later filters.
    Accept,
}

pub trait MeterFilter: Send + Sync {
    /// Sees the id after every filter has mapped it.
    fn accept(&self, _id: &Id) -> FilterReply {
        FilterReply::Neutral
    }

    fn map(&self, id: Id) -> Id {
        id
    }

    /// Adjust the config a timer or summary asked for, before the registry
    /// defaults are merged beneath it. Timer configs are in nanoseconds.
    fn configure(&self, _id: &Id, config: DistributionConfig) -> DistributionConfig {
        config
    }
}

/// Adds tags to every id which does not already carry their keys.
pub struct CommonTags {
    tags: Vec<Tag>,
}

impl CommonTags {
    pub fn new(tags: Vec<Tag>) -> Self {
        Self { tags }
    }
}

impl MeterFilter for CommonTags {
    fn map(&self, id: Id) -> Id {
        id.with_common_tags(&self.tags)
    }
}

/// Drops the given tag keys from every id.
pub struct IgnoreTags {
    keys: Vec<String>,
}

impl IgnoreTags {
    pub fn new(keys: &[&str]) -> Self {
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl MeterFilter for IgnoreTags {
    fn map(&self, id: Id) -> Id {
        self.keys.iter().fold(id, |id, key| id.without_tag(key))
    }
}

/// Renames a tag key on meters whose name starts with a prefix.
pub struct RenameTag {
    prefix: String,
    from: String,
    to: String,
}

impl RenameTag {
    pub fn new(prefix: &str, from: &str, to: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl MeterFilter for RenameTag {
    fn map(&self, id: Id) -> Id {
        if !id.name().starts_with(&self.prefix) {
            return id;
        }
        match id.tag(&self.from).map(|v| v.to_string()) {
            Some(value) => id.without_tag(&self.from).with_tag(&self.to, &value),
            None => id,
        }
    }
}

/// Rewrites the values of one tag key, for example to bound cardinality.
pub struct ReplaceTagValues<F> {
    key: String,
    replacement: F,
}

impl<F> ReplaceTagValues<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    pub fn new(key: &str, replacement: F) -> Self {
        Self {
            key: key.to_string(),
            replacement,
        }
    }
}

impl<F> MeterFilter for ReplaceTagValues<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn map(&self, id: Id) -> Id {
        match id.tag(&self.key).map(|v| (self.replacement)(v)) {
            Some(value) => id.with_tag(&self.key, &value),
            None => id,
        }
    }
}

/// Rewrites ids with an arbitrary function.
pub struct MapId<F>(pub F);

impl<F> MeterFilter for MapId<F>
where
    F: Fn(Id) -> Id + Send + Sync,
{
    fn map(&self, id: Id) -> Id {
        (self.0)(id)
    }
}

/// Denies meters matching the predicate.
pub struct Deny<F>(pub F);

impl<F> MeterFilter for Deny<F>
where
    F: Fn(&Id) -> bool + Send + Sync,
{
    fn accept(&self, id: &Id) -> FilterReply {
        if (self.0)(id) {
            FilterReply::Deny
        } else {
            FilterReply::Neutral
        }
    }
}

/// Accepts meters matching the predicate, ending the decision early.
pub struct Accept<F>(pub F);

impl<F> MeterFilter for Accept<F>
where
    F: Fn(&Id) -> bool + Send + Sync,
{
    fn accept(&self, id: &Id) -> FilterReply {
        if (self.0)(id) {
            FilterReply::Accept
        } else {
            FilterReply::Neutral
        }
    }
}

/// Denies every meter not matching the predicate.
pub struct DenyUnless<F>(pub F);

impl<F> MeterFilter for DenyUnless<F>
where
    F: Fn(&Id) -> bool + Send + Sync,
{
    fn accept(&self, id: &Id) -> FilterReply {
        if (self.0)(id) {
            FilterReply::Neutral
        } else {
            FilterReply::Deny
        }
    }
}

pub fn deny_name_starts_with(prefix: &str) -> Deny<impl Fn(&Id) -> bool + Send + Sync> {
    let prefix = prefix.to_string();
    Deny(move |id: &Id| id.name().starts_with(&prefix))
}

pub fn accept_name_starts_with(prefix: &str) -> Accept<impl Fn(&Id) -> bool + Send + Sync> {
    let prefix = prefix.to_string();
    Accept(move |id: &Id| id.name().starts_with(&prefix))
}

/// Overrides distribution settings for meters of one type whose name starts
/// with a prefix. Fields set here win over what the meter asked for.
pub struct Configure {
    prefix: String,
    meter_type: MeterType,
    config: DistributionConfig,
}

impl Configure {
    pub fn new(prefix: &str, meter_type: MeterType, config: DistributionConfig) -> Self {
        Self {
            prefix: prefix.to_string(),
            meter_type,
            config,
        }
    }

    /// Maximum expected duration of matching timers.
    pub fn max_expected_duration(prefix: &str, max: Duration) -> Self {
        let config = DistributionConfig {
            maximum_expected_value: Some(max.as_nanos() as f64),
            ..DistributionConfig::none()
        };
        Self::new(prefix, MeterType::Timer, config)
    }

    /// Minimum expected duration of matching timers.
    pub fn min_expected_duration(prefix: &str, min: Duration) -> Self {
        let config = DistributionConfig {
            minimum_expected_value: Some(min.as_nanos() as f64),
            ..DistributionConfig::none()
        };
        Self::new(prefix, MeterType::Timer, config)
    }

    /// Maximum expected value of matching distribution summaries.
    pub fn max_expected(prefix: &str, max: f64) -> Self {
        let config = DistributionConfig {
            maximum_expected_value: Some(max),
            ..DistributionConfig::none()
        };
        Self::new(prefix, MeterType::DistributionSummary, config)
    }

    /// Minimum expected value of matching distribution summaries.
    pub fn min_expected(prefix: &str, min: f64) -> Self {
        let config = DistributionConfig {
            minimum_expected_value: Some(min),
            ..DistributionConfig::none()
        };
        Self::new(prefix, MeterType::DistributionSummary, config)
    }
}

impl MeterFilter for Configure {
    fn configure(&self, id: &Id, config: DistributionConfig) -> DistributionConfig {
        if id.meter_type() == self.meter_type && id.name().starts_with(&self.prefix) {
            self.config.merge(&config)
        } else {
            config
        }
    }
}
