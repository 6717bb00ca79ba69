//! Order-preserving environment map.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

/// Environment variables in first-seen order.
///
/// Re-inserting a name keeps its original position and replaces the value, so
/// a table with duplicate names resolves last-write-wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentMap {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl EnvironmentMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `name`. Returns the previous value, if any.
    pub fn insert(&mut self, name: String, value: String) -> Option<String> {
        if let Some(&pos) = self.index.get(&name) {
            return Some(std::mem::replace(&mut self.entries[pos].1, value));
        }
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push((name, value));
        None
    }

    /// Insert a raw `NAME=VALUE` entry.
    ///
    /// Entries without `=` or with an empty name are rejected and leave the
    /// map untouched.
    pub fn insert_entry(&mut self, entry: &str) -> bool {
        match entry.split_once('=') {
            Some((name, value)) if !name.is_empty() => {
                self.insert(name.to_string(), value.to_string());
                true
            }
            _ => false,
        }
    }

    /// Value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.index
            .get(name)
            .map(|&pos| self.entries[pos].1.as_str())
    }

    /// Whether `name` is present.
    pub fn contains_key(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(name, value)` pairs in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Names in first-seen order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for EnvironmentMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvironmentMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = EnvironmentMap::new();
        for (k, v) in iter {
            map.insert(k.into(), v.into());
        }
        map
    }
}
