//! Object store implementation
//!
//! BTreeMap-based container holding one area's committed entries.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::Result;

/// Committed key/value contents of a single store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectStore {
    entries: BTreeMap<String, Value>,
}

impl ObjectStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Iterate keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Insert or overwrite a value, returning the previous one
    pub fn put(&mut self, key: String, value: Value) -> Option<Value> {
        self.entries.insert(key, value)
    }

    /// Remove a key, returning its value if it was present
    pub fn delete(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Approximate footprint: key bytes plus JSON-encoded value bytes
    pub fn size_bytes(&self) -> Result<usize> {
        self.entries
            .iter()
            .map(|(key, value)| Self::entry_size(key, value))
            .sum()
    }

    /// Footprint of one entry, as counted against a quota
    pub fn entry_size(key: &str, value: &Value) -> Result<usize> {
        Ok(key.len() + serde_json::to_string(value)?.len())
    }

    /// Footprint the store would have after applying a pending write set
    pub(crate) fn projected_size(
        &self,
        cleared: bool,
        writes: &BTreeMap<String, Option<Value>>,
    ) -> Result<usize> {
        let mut size = if cleared { 0 } else { self.size_bytes()? };

        for (key, value) in writes {
            if !cleared {
                if let Some(existing) = self.entries.get(key) {
                    size -= Self::entry_size(key, existing)?;
                }
            }
            if let Some(value) = value {
                size += Self::entry_size(key, value)?;
            }
        }

        Ok(size)
    }
}
