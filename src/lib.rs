// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! A dimensional metrics facade. Meters are created through an explicit
//! `MeterRegistry`, timers and summaries keep their percentiles in rotating
//! time window histograms, and a `PushLoop` hands the registry to a
//! `Publisher` every interval.

pub mod config;
pub mod filter;
pub mod logger;
pub mod meter;
pub mod naming;
pub mod publish;
pub mod registry;
pub mod selection;

pub use crate::filter::{
    accept_name_starts_with, deny_name_starts_with, Accept, CommonTags, Configure, Deny,
    DenyUnless, FilterReply, IgnoreTags, MapId, MeterFilter, RenameTag, ReplaceTagValues,
};
pub use crate::meter::*;
pub use crate::naming::NamingConvention;
pub use crate::publish::{
    collect, publish_once, JsonPublisher, LogPublisher, MeterReport, PublishError, Publisher,
    PushLoop,
};
pub use crate::registry::{MeterRegistry, RegistryConfig, RegistryError};
pub use crate::selection::{
    mode_uniform_sample, selection, selection_any, selection_between, BitSet, SelectionError,
};

pub use datastructures::{
    Clock, ConfigError, DistributionConfig, HistogramError, HistogramOptions, HistogramSnapshot,
    MockClock, SystemClock,
};
