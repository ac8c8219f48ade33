//! Tests for transaction semantics
//!
//! These tests verify:
//! - Requests run in order with read-your-writes visibility
//! - Callbacks can queue follow-up requests
//! - Aborts (explicit, failed request, quota) discard every write
//! - Finished transactions reject further use

use std::sync::{mpsc, Arc};

use parking_lot::Mutex;
use serde_json::json;
use webext_storage::config::Config;
use webext_storage::substrate::{Factory, TransactionMode};
use webext_storage::StorageError;

use crate::common::{memory_factory, open_db, put_all, read, run, TIMEOUT};

// =============================================================================
// Basic Operations
// =============================================================================

#[test]
fn test_put_then_get_in_new_transaction() {
    let db = open_db(&memory_factory(), "db", 1, &["local"]).unwrap();

    put_all(&db, "local", &[("a", json!(1)), ("b", json!({"x": "y"}))]).unwrap();

    assert_eq!(read(&db, "local", "a"), Some(json!(1)));
    assert_eq!(read(&db, "local", "b"), Some(json!({"x": "y"})));
    assert_eq!(read(&db, "local", "c"), None);
}

#[test]
fn test_read_your_own_writes() {
    let db = open_db(&memory_factory(), "db", 1, &["local"]).unwrap();
    put_all(&db, "local", &[("gone", json!(0))]).unwrap();

    let tx = db.transaction("local", TransactionMode::ReadWrite).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    tx.put("a", json!("new")).unwrap();
    tx.delete("gone").unwrap();
    for key in ["a", "gone"] {
        let seen = Arc::clone(&seen);
        tx.get(key, move |value| seen.lock().push(value.unwrap())).unwrap();
    }
    run(&tx).unwrap();

    assert_eq!(*seen.lock(), vec![Some(json!("new")), None]);
}

#[test]
fn test_get_all_keys_sorted() {
    let db = open_db(&memory_factory(), "db", 1, &["local"]).unwrap();
    put_all(&db, "local", &[("b", json!(1)), ("a", json!(2))]).unwrap();

    let tx = db.transaction("local", TransactionMode::ReadWrite).unwrap();
    tx.put("c", json!(3)).unwrap();
    tx.delete("b").unwrap();
    let (sender, receiver) = mpsc::channel();
    tx.get_all_keys(move |keys| {
        let _ = sender.send(keys);
    })
    .unwrap();
    run(&tx).unwrap();

    let keys = receiver.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert_eq!(keys, vec!["a", "c"]);
}

#[test]
fn test_clear_then_put() {
    let db = open_db(&memory_factory(), "db", 1, &["local"]).unwrap();
    put_all(&db, "local", &[("old", json!(1))]).unwrap();

    let tx = db.transaction("local", TransactionMode::ReadWrite).unwrap();
    tx.clear().unwrap();
    tx.put("new", json!(2)).unwrap();
    run(&tx).unwrap();

    assert_eq!(read(&db, "local", "old"), None);
    assert_eq!(read(&db, "local", "new"), Some(json!(2)));
}

#[test]
fn test_readonly_rejects_writes() {
    let db = open_db(&memory_factory(), "db", 1, &["local"]).unwrap();
    let tx = db.transaction("local", TransactionMode::ReadOnly).unwrap();

    assert!(matches!(tx.put("a", json!(1)), Err(StorageError::ReadOnlyTransaction)));
    assert!(matches!(tx.delete("a"), Err(StorageError::ReadOnlyTransaction)));
    assert!(matches!(tx.clear(), Err(StorageError::ReadOnlyTransaction)));
    assert_eq!(tx.mode(), TransactionMode::ReadOnly);
    assert_eq!(tx.store(), "local");
}

#[test]
fn test_empty_transaction_completes() {
    let db = open_db(&memory_factory(), "db", 1, &["local"]).unwrap();
    let tx = db.transaction("local", TransactionMode::ReadWrite).unwrap();

    assert!(run(&tx).is_ok());
}

// =============================================================================
// Callback Chaining
// =============================================================================

#[test]
fn test_callbacks_queue_follow_up_requests() {
    let db = open_db(&memory_factory(), "db", 1, &["local"]).unwrap();
    put_all(&db, "local", &[("a", json!(1)), ("b", json!(2))]).unwrap();

    let tx = db.transaction("local", TransactionMode::ReadOnly).unwrap();
    let values = Arc::new(Mutex::new(Vec::new()));

    let handle = tx.clone();
    let sink = Arc::clone(&values);
    tx.get_all_keys(move |keys| {
        for key in keys.unwrap() {
            let sink = Arc::clone(&sink);
            handle
                .get(key.clone(), move |value| sink.lock().push((key, value.unwrap())))
                .unwrap();
        }
    })
    .unwrap();
    run(&tx).unwrap();

    assert_eq!(
        *values.lock(),
        vec![
            ("a".to_string(), Some(json!(1))),
            ("b".to_string(), Some(json!(2)))
        ]
    );
}

// =============================================================================
// Abort Tests
// =============================================================================

#[test]
fn test_abort_from_callback_discards_writes() {
    let db = open_db(&memory_factory(), "db", 1, &["local"]).unwrap();
    put_all(&db, "local", &[("a", json!(1))]).unwrap();

    let tx = db.transaction("local", TransactionMode::ReadWrite).unwrap();
    tx.put("a", json!(2)).unwrap();
    tx.put("b", json!(3)).unwrap();
    let handle = tx.clone();
    tx.get("a", move |_| {
        handle.abort().unwrap();
    })
    .unwrap();

    assert!(matches!(run(&tx), Err(StorageError::Aborted)));
    assert_eq!(read(&db, "local", "a"), Some(json!(1)));
    assert_eq!(read(&db, "local", "b"), None);
}

#[test]
fn test_abort_before_commit() {
    let db = open_db(&memory_factory(), "db", 1, &["local"]).unwrap();
    let tx = db.transaction("local", TransactionMode::ReadWrite).unwrap();
    tx.put("a", json!(1)).unwrap();

    let (sender, receiver) = mpsc::channel();
    tx.on_error(move |e| {
        let _ = sender.send(e);
    });
    tx.abort().unwrap();

    assert!(matches!(receiver.recv_timeout(TIMEOUT).unwrap(), StorageError::Aborted));
    assert!(matches!(tx.commit(), Err(StorageError::TransactionInactive)));
    assert_eq!(read(&db, "local", "a"), None);
}

#[test]
fn test_finished_transaction_is_inactive() {
    let db = open_db(&memory_factory(), "db", 1, &["local"]).unwrap();
    let tx = db.transaction("local", TransactionMode::ReadWrite).unwrap();
    tx.put("a", json!(1)).unwrap();
    run(&tx).unwrap();

    assert!(matches!(tx.commit(), Err(StorageError::TransactionInactive)));
    assert!(matches!(tx.put("b", json!(2)), Err(StorageError::TransactionInactive)));
    assert!(matches!(tx.abort(), Err(StorageError::TransactionInactive)));
}

#[test]
fn test_quota_exceeded_aborts_commit() {
    let config = Config::builder().quota_bytes(16).build();
    let factory = Factory::new(&config).unwrap();
    let db = open_db(&factory, "db", 1, &["local", "sync"]).unwrap();

    // "a" + "1" = 2 bytes
    put_all(&db, "local", &[("a", json!(1))]).unwrap();

    let result = put_all(
        &db,
        "local",
        &[("b", json!(2)), ("big", json!("xxxxxxxxxxxxxxxxxxxxxxxx"))],
    );

    assert!(matches!(
        result,
        Err(StorageError::QuotaExceeded { ref store, quota: 16, .. }) if store == "local"
    ));
    assert_eq!(read(&db, "local", "a"), Some(json!(1)));
    assert_eq!(read(&db, "local", "b"), None);

    // Quota is per store
    put_all(&db, "sync", &[("s", json!("0123456789"))]).unwrap();
    assert_eq!(read(&db, "sync", "s"), Some(json!("0123456789")));
}
