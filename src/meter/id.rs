// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use super::MeterType;

use serde_derive::Serialize;

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// A key-value pair which adds a dimension to a meter.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Tag {
    key: String,
    value: String,
}

impl Tag {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Identifies a meter by its name and tags. Two ids with the same name and
/// tags are the same id regardless of type, description or base unit.
///
/// Tags are kept sorted by key, and a key appears at most once.
#[derive(Clone, Debug)]
pub struct Id {
    name: String,
    tags: Vec<Tag>,
    meter_type: MeterType,
    base_unit: Option<String>,
    description: Option<String>,
}

impl Id {
    /// When a key is repeated the last value given wins.
    pub fn new(name: &str, tags: &[(&str, &str)]) -> Self {
        let mut id = Self {
            name: name.to_string(),
            tags: Vec::new(),
            meter_type: MeterType::Other,
            base_unit: None,
            description: None,
        };
        for (key, value) in tags {
            id.set_tag(Tag::new(key, value));
        }
        id
    }

    fn set_tag(&mut self, tag: Tag) {
        match self.tags.binary_search_by(|t| t.key.cmp(&tag.key)) {
            Ok(index) => self.tags[index] = tag,
            Err(index) => self.tags.insert(index, tag),
        }
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.set_tag(Tag::new(key, value));
        self
    }

    pub fn without_tag(mut self, key: &str) -> Self {
        self.tags.retain(|t| t.key != key);
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_base_unit(mut self, base_unit: &str) -> Self {
        self.base_unit = Some(base_unit.to_string());
        self
    }

    pub(crate) fn with_meter_type(mut self, meter_type: MeterType) -> Self {
        self.meter_type = meter_type;
        self
    }

    /// Add each tag whose key the id does not already carry.
    pub(crate) fn with_common_tags(mut self, tags: &[Tag]) -> Self {
        for tag in tags {
            if self.tag(tag.key()).is_none() {
                self.set_tag(tag.clone());
            }
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .binary_search_by(|t| t.key.as_str().cmp(key))
            .ok()
            .map(|index| self.tags[index].value())
    }

    pub fn meter_type(&self) -> MeterType {
        self.meter_type
    }

    pub fn base_unit(&self) -> Option<&str> {
        self.base_unit.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl PartialEq for Id {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.tags == other.tags
    }
}

impl Eq for Id {}

impl Hash for Id {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.tags.hash(state);
    }
}

impl PartialOrd for Id {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Id {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.tags.cmp(&other.tags))
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.tags.is_empty() {
            let tags: Vec<String> = self
                .tags
                .iter()
                .map(|t| format!("{}={}", t.key, t.value))
                .collect();
            write!(f, "{{{}}}", tags.join(","))?;
        }
        Ok(())
    }
}
