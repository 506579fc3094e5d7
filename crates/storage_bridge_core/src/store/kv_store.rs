//! Single-namespace key/value store.

use crate::model::value::{StoredValue, ValueMap};
use std::collections::BTreeSet;

/// In-memory mapping backing one namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Store {
    entries: ValueMap,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: ValueMap) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&StoredValue> {
        self.entries.get(key)
    }

    /// Full copy of the current mapping.
    pub fn snapshot(&self) -> ValueMap {
        self.entries.clone()
    }

    /// `get` selection.
    ///
    /// `None` selects every entry. Otherwise returns exactly the listed keys
    /// that are present; missing keys are omitted.
    pub fn project(&self, keys: Option<&[String]>) -> ValueMap {
        let Some(keys) = keys else {
            return self.snapshot();
        };
        keys.iter()
            .filter_map(|key| {
                self.entries
                    .get(key)
                    .map(|value| (key.clone(), value.clone()))
            })
            .collect()
    }

    /// Overwrites or inserts every entry of `partial`; other keys are kept.
    pub fn merge(&mut self, partial: &ValueMap) {
        for (key, value) in partial {
            self.entries.insert(key.clone(), value.clone());
        }
    }

    /// Keeps only the entries whose key is not listed.
    pub fn retain_unlisted(&mut self, keys: &[String]) {
        let listed = keys.iter().map(String::as_str).collect::<BTreeSet<_>>();
        self.entries.retain(|key, _| !listed.contains(key.as_str()));
    }

    /// Swaps in `entries` and returns the previous mapping.
    pub fn replace(&mut self, entries: ValueMap) -> ValueMap {
        std::mem::replace(&mut self.entries, entries)
    }
}
