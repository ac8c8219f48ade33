//! Tests for the database gatekeeper
//!
//! These tests verify:
//! - The database is opened lazily and only once
//! - Missing area stores are created by the upgrade, existing data is kept
//! - Open failures surface as `OpenFailed` and are retried on the next call
//! - Persisted storage survives a restart

use std::sync::{mpsc, Arc};
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use webext_storage::config::WalSyncStrategy;
use webext_storage::gatekeeper::Gatekeeper;
use webext_storage::substrate::{Database, Factory, TransactionMode};
use webext_storage::wal::{Record, WalWriter};
use webext_storage::{BrowserStorage, Config, Items, Keys, StorageError};

// =============================================================================
// Helper Functions
// =============================================================================

/// Open a database directly on the factory, creating `stores`
fn precreate(factory: &Factory, name: &str, version: u64, stores: &'static [&'static str]) -> Database {
    let (sender, receiver) = mpsc::channel();
    factory
        .open(name, version)
        .on_upgrade_needed(move |upgrade| {
            for store in stores {
                upgrade.create_object_store(store)?;
            }
            Ok(())
        })
        .on_success(move |db| {
            let _ = sender.send(db);
        })
        .submit()
        .unwrap();
    receiver.recv_timeout(Duration::from_secs(5)).unwrap()
}

fn items(value: Value) -> Items {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {}", other),
    }
}

// =============================================================================
// Lazy Open Tests
// =============================================================================

#[tokio::test]
async fn test_open_is_lazy() {
    let storage = BrowserStorage::open(&Config::default()).unwrap();

    assert!(!storage.gatekeeper().is_open());
    assert_eq!(storage.gatekeeper().db_name(), Config::DEFAULT_DB_NAME);

    storage.local().get(Keys::All).await.unwrap();

    assert!(storage.gatekeeper().is_open());
}

#[tokio::test]
async fn test_open_creates_area_stores() {
    let factory = Factory::new(&Config::default()).unwrap();
    let gatekeeper = Gatekeeper::new(factory, &Config::default());

    let db = gatekeeper.open_database().await.unwrap();

    assert_eq!(db.name(), Config::DEFAULT_DB_NAME);
    assert_eq!(db.version(), Config::DEFAULT_DB_VERSION);
    assert_eq!(db.object_store_names(), vec!["local", "managed", "sync"]);
}

#[tokio::test]
async fn test_concurrent_first_calls_share_one_open() {
    let factory = Factory::new(&Config::default()).unwrap();
    let gatekeeper = Arc::new(Gatekeeper::new(factory, &Config::default()));

    let (first, second, third) = tokio::join!(
        gatekeeper.open_database(),
        gatekeeper.open_database(),
        gatekeeper.open_database()
    );

    let names: Vec<_> = [first, second, third]
        .into_iter()
        .map(|db| db.unwrap().object_store_names())
        .collect();
    assert!(names.iter().all(|n| n.len() == 3));
    assert!(gatekeeper.is_open());
}

#[tokio::test]
async fn test_concurrent_area_operations_before_open() {
    let storage = BrowserStorage::open(&Config::default()).unwrap();

    let (local, sync) = tokio::join!(
        storage.local().set(items(json!({"a": 1}))),
        storage.sync().set(items(json!({"b": 2})))
    );
    local.unwrap();
    sync.unwrap();

    assert_eq!(storage.local().get(Keys::All).await.unwrap().len(), 1);
    assert_eq!(storage.sync().get(Keys::All).await.unwrap().len(), 1);
}

// =============================================================================
// Upgrade Tests
// =============================================================================

#[tokio::test]
async fn test_upgrade_adds_missing_stores_and_keeps_data() {
    let factory = Factory::new(&Config::default()).unwrap();
    let db = precreate(&factory, Config::DEFAULT_DB_NAME, 1, &["local"]);

    let tx = db.transaction("local", TransactionMode::ReadWrite).unwrap();
    tx.put("kept", json!("yes")).unwrap();
    let (sender, receiver) = mpsc::channel();
    tx.on_complete(move || {
        let _ = sender.send(());
    });
    tx.commit().unwrap();
    receiver.recv_timeout(Duration::from_secs(5)).unwrap();

    let config = Config::builder().db_version(2).build();
    let storage = BrowserStorage::new(
        factory,
        &config,
        Arc::new(webext_storage::changes::SignalBus::new()),
    );

    assert_eq!(
        Value::Object(storage.local().get("kept").await.unwrap()),
        json!({"kept": "yes"})
    );
    storage.sync().set(items(json!({"new": 1}))).await.unwrap();

    let db = storage.gatekeeper().open_database().await.unwrap();
    assert_eq!(db.version(), 2);
    assert_eq!(db.object_store_names().len(), 3);
}

// =============================================================================
// Failure Tests
// =============================================================================

#[tokio::test]
async fn test_newer_existing_version_fails_open() {
    let factory = Factory::new(&Config::default()).unwrap();
    precreate(&factory, Config::DEFAULT_DB_NAME, 3, &["local", "sync", "managed"]);

    let storage = BrowserStorage::new(
        factory,
        &Config::default(),
        Arc::new(webext_storage::changes::SignalBus::new()),
    );
    let error = storage.local().get(Keys::All).await.unwrap_err();

    assert!(matches!(error, StorageError::OpenFailed(_)));
    assert!(matches!(
        error.root_cause(),
        StorageError::VersionConflict {
            requested: 1,
            existing: 3
        }
    ));
    assert!(!storage.gatekeeper().is_open());
}

#[tokio::test]
async fn test_failed_open_is_retried() {
    let dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .build();
    let wal_path = dir.path().join(format!("{}.wal", Config::DEFAULT_DB_NAME));

    // A log whose only record targets a store that was never created
    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer
            .append(Record::Commit {
                store: "ghost".to_string(),
                cleared: false,
                writes: vec![("k".to_string(), Some("1".to_string()))],
            })
            .unwrap();
    }

    let storage = BrowserStorage::open(&config).unwrap();
    let error = storage.local().get(Keys::All).await.unwrap_err();
    assert!(matches!(error.root_cause(), StorageError::WalCorruption(_)));
    assert!(!storage.gatekeeper().is_open());

    std::fs::remove_file(&wal_path).unwrap();

    storage.local().set(items(json!({"a": 1}))).await.unwrap();
    assert!(storage.gatekeeper().is_open());
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[tokio::test]
async fn test_storage_survives_restart() {
    let dir = TempDir::new().unwrap();
    let config = Config::builder().data_dir(dir.path()).build();

    {
        let storage = BrowserStorage::open(&config).unwrap();
        storage
            .local()
            .set(items(json!({"a": {"deep": [1, 2, 3]}, "b": "two"})))
            .await
            .unwrap();
        storage.local().remove("b").await.unwrap();
        storage.sync().set(items(json!({"s": true}))).await.unwrap();
    }

    let storage = BrowserStorage::open(&config).unwrap();
    assert_eq!(
        Value::Object(storage.local().get(Keys::All).await.unwrap()),
        json!({"a": {"deep": [1, 2, 3]}})
    );
    assert_eq!(
        Value::Object(storage.sync().get(Keys::All).await.unwrap()),
        json!({"s": true})
    );
}
