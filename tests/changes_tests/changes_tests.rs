//! Tests for change notifications
//!
//! These tests verify:
//! - Signal keys are split into area and key at the first ':'
//! - Values are decoded from JSON text, absent values stay absent
//! - Unknown areas, unprefixed keys and undecodable values are ignored
//! - Listener registration, removal and fan-out order
//! - The signal source is subscribed to exactly once

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use webext_storage::changes::{
    decode_event, ChangeListener, Changes, OnChanged, SignalBus, StorageChange, StorageEvent,
    StorageSignal,
};
use webext_storage::AreaName;

// =============================================================================
// Helper Functions
// =============================================================================

type Received = Arc<Mutex<Vec<(String, Changes, AreaName)>>>;

/// A listener that records every call, tagged with `tag`
fn recording(tag: &str, received: &Received) -> ChangeListener {
    let tag = tag.to_string();
    let received = Arc::clone(received);
    Arc::new(move |changes: &Changes, area: AreaName| {
        received.lock().push((tag.clone(), changes.clone(), area));
    })
}

fn setup() -> (Arc<SignalBus>, OnChanged) {
    let bus = Arc::new(SignalBus::new());
    let signal: Arc<dyn StorageSignal> = bus.clone();
    (bus, OnChanged::new(signal))
}

// =============================================================================
// Decoding Tests
// =============================================================================

#[test]
fn test_decode_event() {
    let event = StorageEvent::new("local:theme", Some("\"light\""), Some("\"dark\""));

    let (area, changes) = decode_event(&event).unwrap();

    assert_eq!(area, AreaName::Local);
    assert_eq!(
        changes.get("theme"),
        Some(&StorageChange {
            old_value: Some(json!("light")),
            new_value: Some(json!("dark")),
        })
    );
    assert_eq!(changes.len(), 1);
}

#[test]
fn test_decode_keeps_colons_inside_key() {
    let event = StorageEvent::new("sync:a:b:c", None, Some("{\"x\":1}"));

    let (area, changes) = decode_event(&event).unwrap();

    assert_eq!(area, AreaName::Sync);
    let change = &changes["a:b:c"];
    assert_eq!(change.old_value, None);
    assert_eq!(change.new_value, Some(json!({"x": 1})));
}

#[test]
fn test_decode_removal() {
    let event = StorageEvent::new("managed:k", Some("[1,2]"), None);

    let (area, changes) = decode_event(&event).unwrap();

    assert_eq!(area, AreaName::Managed);
    assert_eq!(changes["k"].old_value, Some(json!([1, 2])));
    assert_eq!(changes["k"].new_value, None);
}

#[test]
fn test_decode_ignores_unrelated_signals() {
    assert!(decode_event(&StorageEvent::new("theme", None, Some("1"))).is_none());
    assert!(decode_event(&StorageEvent::new("session:theme", None, Some("1"))).is_none());
    assert!(decode_event(&StorageEvent::new("local:bad", None, Some("{not json"))).is_none());
    assert!(decode_event(&StorageEvent::default()).is_none());
}

#[test]
fn test_storage_change_serializes_camel_case() {
    let change = StorageChange {
        old_value: None,
        new_value: Some(json!(2)),
    };

    assert_eq!(serde_json::to_value(&change).unwrap(), json!({"newValue": 2}));
}

// =============================================================================
// Registration Tests
// =============================================================================

#[test]
fn test_add_has_remove_listener() {
    let (_bus, on_changed) = setup();
    let received = Received::default();
    let listener = recording("a", &received);

    assert!(!on_changed.has_listeners());
    on_changed.add_listener(Arc::clone(&listener));
    assert!(on_changed.has_listener(&listener));
    assert!(on_changed.has_listeners());

    on_changed.remove_listener(&listener);
    assert!(!on_changed.has_listener(&listener));
    assert!(!on_changed.has_listeners());
}

#[test]
fn test_identity_is_by_reference() {
    let (_bus, on_changed) = setup();
    let received = Received::default();
    let first = recording("same", &received);
    let second = recording("same", &received);

    on_changed.add_listener(Arc::clone(&first));

    assert!(!on_changed.has_listener(&second));
}

#[test]
fn test_subscribes_once_on_first_add() {
    let (bus, on_changed) = setup();
    let received = Received::default();

    assert_eq!(bus.subscriber_count(), 0);
    on_changed.add_listener(recording("a", &received));
    on_changed.add_listener(recording("b", &received));

    assert_eq!(bus.subscriber_count(), 1);
}

// =============================================================================
// Dispatch Tests
// =============================================================================

#[test]
fn test_fan_out_in_registration_order() {
    let (bus, on_changed) = setup();
    let received = Received::default();
    on_changed.add_listener(recording("first", &received));
    on_changed.add_listener(recording("second", &received));

    bus.emit(&StorageEvent::new("local:k", None, Some("1")));

    let calls = received.lock();
    let tags: Vec<_> = calls.iter().map(|(tag, _, _)| tag.as_str()).collect();
    assert_eq!(tags, vec!["first", "second"]);
    assert!(calls.iter().all(|(_, changes, area)| {
        *area == AreaName::Local && changes["k"].new_value == Some(json!(1))
    }));
}

#[test]
fn test_duplicate_add_notifies_once() {
    let (bus, on_changed) = setup();
    let received = Received::default();
    let listener = recording("a", &received);
    on_changed.add_listener(Arc::clone(&listener));
    on_changed.add_listener(Arc::clone(&listener));

    bus.emit(&StorageEvent::new("sync:k", None, Some("true")));

    assert_eq!(received.lock().len(), 1);
}

#[test]
fn test_ignored_signals_reach_no_listener() {
    let (bus, on_changed) = setup();
    let received = Received::default();
    on_changed.add_listener(recording("a", &received));

    bus.emit(&StorageEvent::new("nocolon", None, Some("1")));
    bus.emit(&StorageEvent::new("other:k", None, Some("1")));
    bus.emit(&StorageEvent::new("local:k", None, Some("not json")));
    bus.emit(&StorageEvent::default());

    assert!(received.lock().is_empty());
}

#[test]
fn test_removed_listener_stops_receiving() {
    let (bus, on_changed) = setup();
    let received = Received::default();
    let kept = recording("kept", &received);
    let removed = recording("removed", &received);
    on_changed.add_listener(Arc::clone(&kept));
    on_changed.add_listener(Arc::clone(&removed));

    on_changed.remove_listener(&removed);
    bus.emit(&StorageEvent::new("local:k", None, Some("1")));

    let calls = received.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "kept");
}

#[test]
fn test_dropped_registry_stops_dispatch() {
    let (bus, on_changed) = setup();
    let received = Received::default();
    on_changed.add_listener(recording("a", &received));

    drop(on_changed);
    bus.emit(&StorageEvent::new("local:k", None, Some("1")));

    assert!(received.lock().is_empty());
}

#[test]
fn test_listener_may_register_during_dispatch() {
    let (bus, on_changed) = setup();
    let on_changed = Arc::new(on_changed);
    let received = Received::default();

    let late = recording("late", &received);
    let registry = Arc::clone(&on_changed);
    let registering: ChangeListener = Arc::new(move |_: &Changes, _: AreaName| {
        registry.add_listener(Arc::clone(&late));
    });
    on_changed.add_listener(registering);

    bus.emit(&StorageEvent::new("local:k", None, Some("1")));
    assert!(received.lock().is_empty());

    bus.emit(&StorageEvent::new("local:k", None, Some("2")));
    assert_eq!(received.lock().len(), 1);
}
