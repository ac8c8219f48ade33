//! Key selectors
//!
//! `get` accepts nothing, one key, a list of keys, or a mapping of keys to
//! defaults; `remove` accepts one key or a list. Callers' values are parsed
//! into these variants once, at the boundary, and the operations dispatch on
//! the variant.

use serde_json::{Map, Value};

use crate::error::{Result, StorageError};

/// A mapping of keys to structured values, as read from or written to an area
pub type Items = Map<String, Value>;

/// Selector for `get` and `get_bytes_in_use`
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Keys {
    /// Every key in the area
    #[default]
    All,

    One(String),

    Many(Vec<String>),

    /// Each key falls back to its value here when absent from the store
    Defaults(Items),
}

impl Keys {
    /// Parse a dynamically-shaped selector
    ///
    /// `null` → All, string → One, array of strings → Many, object → Defaults.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Keys::All),
            Value::String(key) => Ok(Keys::One(key)),
            Value::Array(items) => string_list(items).map(Keys::Many),
            Value::Object(defaults) => Ok(Keys::Defaults(defaults)),
            other => Err(StorageError::InvalidKeys(format!(
                "expected null, string, array or object, got {}",
                other
            ))),
        }
    }

    /// Keys to fetch, `None` meaning every key
    pub fn requested(&self) -> Option<Vec<String>> {
        match self {
            Keys::All => None,
            Keys::One(key) => Some(vec![key.clone()]),
            Keys::Many(keys) => Some(keys.clone()),
            Keys::Defaults(defaults) => Some(defaults.keys().cloned().collect()),
        }
    }

    /// Initial result before stored values are merged in
    pub fn seed(&self) -> Items {
        match self {
            Keys::Defaults(defaults) => defaults.clone(),
            _ => Items::new(),
        }
    }
}

impl TryFrom<Value> for Keys {
    type Error = StorageError;

    fn try_from(value: Value) -> Result<Self> {
        Keys::from_value(value)
    }
}

impl From<&str> for Keys {
    fn from(key: &str) -> Self {
        Keys::One(key.to_string())
    }
}

impl From<String> for Keys {
    fn from(key: String) -> Self {
        Keys::One(key)
    }
}

impl From<Vec<String>> for Keys {
    fn from(keys: Vec<String>) -> Self {
        Keys::Many(keys)
    }
}

impl From<&[&str]> for Keys {
    fn from(keys: &[&str]) -> Self {
        Keys::Many(keys.iter().map(|k| k.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Keys {
    fn from(keys: [&str; N]) -> Self {
        Keys::Many(keys.iter().map(|k| k.to_string()).collect())
    }
}

impl From<Items> for Keys {
    fn from(defaults: Items) -> Self {
        Keys::Defaults(defaults)
    }
}

impl<T: Into<Keys>> From<Option<T>> for Keys {
    fn from(keys: Option<T>) -> Self {
        keys.map(Into::into).unwrap_or(Keys::All)
    }
}

/// Selector for `remove`
#[derive(Debug, Clone, PartialEq)]
pub enum RemoveKeys {
    One(String),
    Many(Vec<String>),
}

impl RemoveKeys {
    /// Parse a string or array of strings
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(key) => Ok(RemoveKeys::One(key)),
            Value::Array(items) => string_list(items).map(RemoveKeys::Many),
            other => Err(StorageError::InvalidKeys(format!(
                "expected string or array, got {}",
                other
            ))),
        }
    }

    /// Normalize to a list
    pub fn into_vec(self) -> Vec<String> {
        match self {
            RemoveKeys::One(key) => vec![key],
            RemoveKeys::Many(keys) => keys,
        }
    }
}

impl TryFrom<Value> for RemoveKeys {
    type Error = StorageError;

    fn try_from(value: Value) -> Result<Self> {
        RemoveKeys::from_value(value)
    }
}

impl From<&str> for RemoveKeys {
    fn from(key: &str) -> Self {
        RemoveKeys::One(key.to_string())
    }
}

impl From<String> for RemoveKeys {
    fn from(key: String) -> Self {
        RemoveKeys::One(key)
    }
}

impl From<Vec<String>> for RemoveKeys {
    fn from(keys: Vec<String>) -> Self {
        RemoveKeys::Many(keys)
    }
}

impl<const N: usize> From<[&str; N]> for RemoveKeys {
    fn from(keys: [&str; N]) -> Self {
        RemoveKeys::Many(keys.iter().map(|k| k.to_string()).collect())
    }
}

fn string_list(items: Vec<Value>) -> Result<Vec<String>> {
    items
        .into_iter()
        .map(|item| match item {
            Value::String(key) => Ok(key),
            other => Err(StorageError::InvalidKeys(format!(
                "key list members must be strings, got {}",
                other
            ))),
        })
        .collect()
}
