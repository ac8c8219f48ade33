//! Change notifications
//!
//! Bridges a generic cross-document storage signal (a key plus old and new
//! values as JSON text) to the `on_changed` listener contract: listeners are
//! called with a one-entry change map and the area the key belongs to.
//!
//! ## Signal Key Format
//! ```text
//! "<area>:<key>"    e.g. "local:theme"
//! ```
//! Only the first `:` separates; the rest belongs to the key, so
//! `"local:a:b"` reports key `a:b` rather than cutting it at the second `:`.
//! Signals without a key, without a separator, or naming an unknown area are
//! ignored.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::area::AreaName;

/// A cross-document storage signal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageEvent {
    /// `None` when the whole backing storage was cleared
    pub key: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl StorageEvent {
    pub fn new(
        key: impl Into<String>,
        old_value: Option<&str>,
        new_value: Option<&str>,
    ) -> Self {
        Self {
            key: Some(key.into()),
            old_value: old_value.map(str::to_string),
            new_value: new_value.map(str::to_string),
        }
    }
}

pub type SignalHandler = Arc<dyn Fn(&StorageEvent) + Send + Sync>;

/// Source of storage signals
pub trait StorageSignal: Send + Sync {
    fn subscribe(&self, handler: SignalHandler);
}

/// In-process signal source; `emit` delivers to every subscriber
#[derive(Default)]
pub struct SignalBus {
    handlers: RwLock<Vec<SignalHandler>>,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: &StorageEvent) {
        // Snapshot so handlers may subscribe while being called.
        let handlers = self.handlers.read().clone();
        for handler in handlers {
            handler(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }
}

impl StorageSignal for SignalBus {
    fn subscribe(&self, handler: SignalHandler) {
        self.handlers.write().push(handler);
    }
}

/// Old and new value of one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageChange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

/// Changed keys mapped to their change
pub type Changes = BTreeMap<String, StorageChange>;

pub type ChangeListener = Arc<dyn Fn(&Changes, AreaName) + Send + Sync>;

/// Listener registry behind `storage.on_changed`
pub struct OnChanged {
    signal: Arc<dyn StorageSignal>,
    listeners: Arc<RwLock<Vec<ChangeListener>>>,
    subscribed: AtomicBool,
}

impl OnChanged {
    pub fn new(signal: Arc<dyn StorageSignal>) -> Self {
        Self {
            signal,
            listeners: Arc::new(RwLock::new(Vec::new())),
            subscribed: AtomicBool::new(false),
        }
    }

    /// Register a listener; registering the same listener twice is a no-op
    pub fn add_listener(&self, listener: ChangeListener) {
        {
            let mut listeners = self.listeners.write();
            if listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
                return;
            }
            listeners.push(listener);
        }

        if !self.subscribed.swap(true, Ordering::SeqCst) {
            self.subscribe();
        }
    }

    pub fn remove_listener(&self, listener: &ChangeListener) {
        self.listeners.write().retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub fn has_listener(&self, listener: &ChangeListener) -> bool {
        self.listeners.read().iter().any(|l| Arc::ptr_eq(l, listener))
    }

    pub fn has_listeners(&self) -> bool {
        !self.listeners.read().is_empty()
    }

    /// Hook the signal source once; dispatch stops when this registry is dropped
    fn subscribe(&self) {
        let listeners: Weak<RwLock<Vec<ChangeListener>>> = Arc::downgrade(&self.listeners);

        self.signal.subscribe(Arc::new(move |event: &StorageEvent| {
            let Some(listeners) = listeners.upgrade() else {
                return;
            };
            let Some((area, changes)) = decode_event(event) else {
                return;
            };

            let snapshot = listeners.read().clone();
            for listener in snapshot {
                listener(&changes, area);
            }
        }));

        tracing::debug!("Subscribed to storage signals");
    }
}

/// Translate a signal into an area and its one-entry change map
pub fn decode_event(event: &StorageEvent) -> Option<(AreaName, Changes)> {
    let signal_key = event.key.as_deref()?;

    let Some((area, key)) = signal_key.split_once(':') else {
        tracing::trace!(key = signal_key, "Ignoring storage signal without area prefix");
        return None;
    };
    let Ok(area) = area.parse::<AreaName>() else {
        tracing::trace!(key = signal_key, "Ignoring storage signal for unknown area");
        return None;
    };

    let change = StorageChange {
        old_value: decode_value(signal_key, event.old_value.as_deref())?,
        new_value: decode_value(signal_key, event.new_value.as_deref())?,
    };

    let mut changes = Changes::new();
    changes.insert(key.to_string(), change);
    Some((area, changes))
}

/// `Some(None)` for an absent value, `None` when the text is not JSON
fn decode_value(signal_key: &str, text: Option<&str>) -> Option<Option<Value>> {
    let Some(text) = text else {
        return Some(None);
    };

    match serde_json::from_str(text) {
        Ok(value) => Some(Some(value)),
        Err(e) => {
            tracing::warn!(key = signal_key, "Dropping storage signal with undecodable value: {}", e);
            None
        }
    }
}
