//! Filter metadata lookup.
//!
//! The graph itself never needs to know anything about a filter beyond the
//! typings it was built with. The source emitter does: a filter whose output
//! count depends on its options (`split`, `concat`, ...) must be written with
//! `filter_multi_output` even when a given instance happens to have a single
//! output.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What the emitter needs to know about one filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterMetadata {
    /// Fixed input count, ignored when `dynamic_inputs` is set.
    #[serde(default)]
    pub input_arity: usize,
    /// Fixed output count, ignored when `dynamic_outputs` is set.
    #[serde(default = "default_arity")]
    pub output_arity: usize,
    /// Input count is computed from the options.
    #[serde(default)]
    pub dynamic_inputs: bool,
    /// Output count is computed from the options.
    #[serde(default)]
    pub dynamic_outputs: bool,
}

fn default_arity() -> usize {
    1
}

impl FilterMetadata {
    pub const fn fixed(input_arity: usize, output_arity: usize) -> Self {
        Self {
            input_arity,
            output_arity,
            dynamic_inputs: false,
            dynamic_outputs: false,
        }
    }

    pub const fn dynamic(dynamic_inputs: bool, dynamic_outputs: bool) -> Self {
        Self {
            input_arity: 1,
            output_arity: 1,
            dynamic_inputs,
            dynamic_outputs,
        }
    }
}

/// Filter metadata lookup by name.
pub trait FilterCatalog: Send + Sync {
    fn lookup(&self, name: &str) -> Option<FilterMetadata>;

    /// Whether `name` is known to have an option-dependent output count.
    /// Unknown filters are treated as fixed.
    fn has_dynamic_outputs(&self, name: &str) -> bool {
        self.lookup(name).map(|m| m.dynamic_outputs).unwrap_or(false)
    }
}

/// Filters shipped with the crate.
const BUILTIN_FILTERS: &[(&str, FilterMetadata)] = &[
    // Fan-out
    ("split", FilterMetadata::dynamic(false, true)),
    ("asplit", FilterMetadata::dynamic(false, true)),
    // Joins
    ("concat", FilterMetadata::dynamic(true, true)),
    ("amix", FilterMetadata::dynamic(true, false)),
    ("amerge", FilterMetadata::dynamic(true, false)),
    ("hstack", FilterMetadata::dynamic(true, false)),
    ("vstack", FilterMetadata::dynamic(true, false)),
    ("xstack", FilterMetadata::dynamic(true, false)),
    ("overlay", FilterMetadata::fixed(2, 1)),
    // Single stream video
    ("reverse", FilterMetadata::fixed(1, 1)),
    ("trim", FilterMetadata::fixed(1, 1)),
    ("scale", FilterMetadata::fixed(1, 1)),
    ("crop", FilterMetadata::fixed(1, 1)),
    ("hflip", FilterMetadata::fixed(1, 1)),
    ("vflip", FilterMetadata::fixed(1, 1)),
    ("fps", FilterMetadata::fixed(1, 1)),
    ("setpts", FilterMetadata::fixed(1, 1)),
    ("drawtext", FilterMetadata::fixed(1, 1)),
    // Single stream audio
    ("areverse", FilterMetadata::fixed(1, 1)),
    ("atrim", FilterMetadata::fixed(1, 1)),
    ("volume", FilterMetadata::fixed(1, 1)),
    ("asetpts", FilterMetadata::fixed(1, 1)),
    ("aecho", FilterMetadata::fixed(1, 1)),
    // Sources with a variable number of outputs
    ("channelsplit", FilterMetadata::dynamic(false, true)),
];

/// Builtin table, optionally extended or overridden by user entries.
#[derive(Debug, Clone, Default)]
pub struct BuiltinCatalog {
    extra: HashMap<String, FilterMetadata>,
}

impl BuiltinCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add entries on top of the builtin table. Later entries win.
    pub fn with_filters<I>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = (String, FilterMetadata)>,
    {
        self.extra.extend(filters);
        self
    }

    /// Names known to this catalog, builtins first.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = BUILTIN_FILTERS.iter().map(|(name, _)| *name).collect();
        let mut extra: Vec<&str> = self
            .extra
            .keys()
            .map(String::as_str)
            .filter(|name| !names.contains(name))
            .collect();
        extra.sort_unstable();
        names.extend(extra);
        names
    }
}

impl FilterCatalog for BuiltinCatalog {
    fn lookup(&self, name: &str) -> Option<FilterMetadata> {
        if let Some(meta) = self.extra.get(name) {
            return Some(*meta);
        }
        BUILTIN_FILTERS
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .map(|(_, meta)| *meta)
    }
}
