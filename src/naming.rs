// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use serde_derive::Deserialize;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

/// How a publisher renders meter names and tag keys for its backend.
///
/// Names are split into words at every character which is not alphanumeric
/// and wherever a lowercase letter or digit is followed by an uppercase one,
/// so `http.serverRequests` is the words `http`, `server` and `requests`.
#[derive(
    Clone, Copy, Debug, Deserialize, EnumIter, EnumString, Eq, IntoStaticStr, PartialEq, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum NamingConvention {
    #[strum(serialize = "identity")]
    Identity,
    #[strum(serialize = "dot")]
    Dot,
    #[strum(serialize = "snake")]
    Snake,
    #[strum(serialize = "camel")]
    Camel,
    #[strum(serialize = "upper_camel")]
    UpperCamel,
    #[strum(serialize = "slashes")]
    Slashes,
}

impl Default for NamingConvention {
    fn default() -> Self {
        NamingConvention::Dot
    }
}

impl std::fmt::Display for NamingConvention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name: &'static str = self.into();
        write!(f, "{}", name)
    }
}

impl NamingConvention {
    pub fn name(self, name: &str) -> String {
        match self {
            NamingConvention::Identity => name.to_string(),
            NamingConvention::Dot => lowercase(name).join("."),
            NamingConvention::Snake => lowercase(name).join("_"),
            NamingConvention::Slashes => lowercase(name).join("/"),
            NamingConvention::Camel => {
                let mut words = lowercase(name).into_iter();
                let mut result = words.next().unwrap_or_default();
                for word in words {
                    result.push_str(&capitalize(&word));
                }
                result
            }
            NamingConvention::UpperCamel => lowercase(name)
                .iter()
                .map(|word| capitalize(word))
                .collect(),
        }
    }

    pub fn tag_key(self, key: &str) -> String {
        self.name(key)
    }

    /// Tag values are passed through unchanged.
    pub fn tag_value(self, value: &str) -> String {
        value.to_string()
    }
}

fn words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut previous: Option<char> = None;

    for c in name.chars() {
        if !c.is_alphanumeric() {
            if !word.is_empty() {
                words.push(std::mem::take(&mut word));
            }
            previous = None;
            continue;
        }
        if let Some(p) = previous {
            if c.is_uppercase() && (p.is_lowercase() || p.is_numeric()) && !word.is_empty() {
                words.push(std::mem::take(&mut word));
            }
        }
        word.push(c);
        previous = Some(c);
    }
    if !word.is_empty() {
        words.push(word);
    }
    words
}

fn lowercase(name: &str) -> Vec<String> {
    words(name).iter().map(|w| w.to_lowercase()).collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
