//! Database handles and upgrade context
//!
//! A database is a named, versioned set of object stores. Its state lives in
//! `DatabaseInner`, shared by every handle the factory hands out and by the
//! transactions running on the event loop.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use serde_json::Value;

use crate::config::WalSyncStrategy;
use crate::error::{Result, StorageError};
use crate::wal::{Record, WalRecovery, WalWriter};

use super::event_loop::EventSender;
use super::factory::UpgradeFn;
use super::{ObjectStore, Transaction, TransactionMode};

/// Version and stores of a database
#[derive(Debug, Default)]
pub(crate) struct DatabaseState {
    pub(crate) version: u64,
    pub(crate) stores: BTreeMap<String, ObjectStore>,
}

impl DatabaseState {
    /// Re-apply a logged record during recovery
    fn replay(&mut self, record: Record) -> Result<()> {
        match record {
            Record::Upgrade {
                version,
                created_stores,
            } => {
                for name in created_stores {
                    self.stores.entry(name).or_default();
                }
                self.version = version;
            }
            Record::Commit {
                store,
                cleared,
                writes,
            } => {
                let target = self.stores.get_mut(&store).ok_or_else(|| {
                    StorageError::WalCorruption(format!("commit for unknown store '{}'", store))
                })?;

                if cleared {
                    target.clear();
                }
                for (key, value) in writes {
                    match value {
                        Some(text) => {
                            target.put(key, serde_json::from_str(&text)?);
                        }
                        None => {
                            target.delete(&key);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Shared state behind every handle to one database
pub(crate) struct DatabaseInner {
    name: String,

    /// Version and committed store contents
    state: RwLock<DatabaseState>,

    /// Log writer, opened lazily the first time a record is appended
    wal: Mutex<Option<WalWriter>>,

    /// Where the log lives; `None` keeps the database in memory
    wal_path: Option<PathBuf>,

    sync_strategy: WalSyncStrategy,
    quota_bytes: Option<usize>,

    /// Set once the database is deleted
    closed: AtomicBool,
}

impl DatabaseInner {
    /// Load a database, replaying its WAL if one exists
    pub(crate) fn load(
        name: &str,
        wal_path: Option<PathBuf>,
        sync_strategy: WalSyncStrategy,
        quota_bytes: Option<usize>,
    ) -> Result<Self> {
        let mut state = DatabaseState::default();
        let mut wal = None;

        if let Some(path) = wal_path.as_ref().filter(|p| p.exists()) {
            let (entries, result) = WalRecovery::recover(path)?;

            if result.entries_recovered > 0 || result.entries_corrupted > 0 {
                tracing::debug!(
                    db = name,
                    recovered = result.entries_recovered,
                    corrupted = result.entries_corrupted,
                    last_lsn = result.last_lsn,
                    "WAL recovery finished"
                );
            }

            for entry in entries {
                state.replay(entry.record)?;
            }
            wal = Some(WalWriter::open_after(path, sync_strategy, result.last_lsn)?);
        }

        Ok(Self {
            name: name.to_string(),
            state: RwLock::new(state),
            wal: Mutex::new(wal),
            wal_path,
            sync_strategy,
            quota_bytes,
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn version(&self) -> u64 {
        self.state.read().version
    }

    pub(crate) fn store_names(&self) -> Vec<String> {
        self.state.read().stores.keys().cloned().collect()
    }

    pub(crate) fn has_store(&self, name: &str) -> bool {
        self.state.read().stores.contains_key(name)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Detach from the log; later transactions and commits fail
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.wal.lock().take();
    }

    /// Read access to committed state
    pub(crate) fn state(&self) -> RwLockReadGuard<'_, DatabaseState> {
        self.state.read()
    }

    /// Run an upgrade to `version` against a staged copy of the stores.
    ///
    /// The staged copy replaces the live stores only if the callback succeeds
    /// and the upgrade is logged.
    pub(crate) fn upgrade(&self, version: u64, upgrade: Option<UpgradeFn>) -> Result<()> {
        let mut state = self.state.write();
        let mut staged = state.stores.clone();

        let mut ctx = UpgradeContext {
            old_version: state.version,
            new_version: version,
            stores: &mut staged,
            created: Vec::new(),
        };
        if let Some(upgrade) = upgrade {
            upgrade(&mut ctx)?;
        }
        let created = ctx.created;

        self.log(Record::Upgrade {
            version,
            created_stores: created.clone(),
        })?;

        tracing::debug!(
            db = %self.name,
            from = state.version,
            to = version,
            created = ?created,
            "Database upgraded"
        );

        state.stores = staged;
        state.version = version;
        Ok(())
    }

    /// Atomically apply a transaction's write set to one store
    ///
    /// Steps:
    /// 1. Check the quota against the projected size
    /// 2. Log the commit
    /// 3. Apply to the live store
    pub(crate) fn commit(
        &self,
        store: &str,
        cleared: bool,
        writes: BTreeMap<String, Option<Value>>,
    ) -> Result<()> {
        if self.is_closed() {
            return Err(StorageError::DatabaseClosed(self.name.clone()));
        }

        let mut state = self.state.write();
        let target = state
            .stores
            .get_mut(store)
            .ok_or_else(|| StorageError::StoreNotFound(store.to_string()))?;

        if let Some(quota) = self.quota_bytes {
            let used = target.projected_size(cleared, &writes)?;
            if used > quota {
                return Err(StorageError::QuotaExceeded {
                    store: store.to_string(),
                    used,
                    quota,
                });
            }
        }

        if self.wal_path.is_some() {
            let logged = writes
                .iter()
                .map(|(key, value)| {
                    let text = value.as_ref().map(serde_json::to_string).transpose()?;
                    Ok((key.clone(), text))
                })
                .collect::<Result<Vec<_>>>()?;

            self.log(Record::Commit {
                store: store.to_string(),
                cleared,
                writes: logged,
            })?;
        }

        if cleared {
            target.clear();
        }
        for (key, value) in writes {
            match value {
                Some(value) => {
                    target.put(key, value);
                }
                None => {
                    target.delete(&key);
                }
            }
        }

        Ok(())
    }

    /// Append a record to the WAL (no-op for in-memory databases)
    fn log(&self, record: Record) -> Result<()> {
        let Some(path) = &self.wal_path else {
            return Ok(());
        };

        let mut wal = self.wal.lock();
        if wal.is_none() {
            *wal = Some(WalWriter::open_after(path, self.sync_strategy, 0)?);
        }
        if let Some(writer) = wal.as_mut() {
            writer.append(record)?;
        }
        Ok(())
    }
}

/// Access to the stores while a version upgrade runs
pub struct UpgradeContext<'a> {
    old_version: u64,
    new_version: u64,
    stores: &'a mut BTreeMap<String, ObjectStore>,
    created: Vec<String>,
}

impl UpgradeContext<'_> {
    /// Version on disk before the upgrade (0 for a new database)
    pub fn old_version(&self) -> u64 {
        self.old_version
    }

    pub fn new_version(&self) -> u64 {
        self.new_version
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    pub fn object_store_names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    /// Create an empty store; fails if one with this name already exists
    pub fn create_object_store(&mut self, name: &str) -> Result<()> {
        if self.contains(name) {
            return Err(StorageError::StoreExists(name.to_string()));
        }
        self.stores.insert(name.to_string(), ObjectStore::new());
        self.created.push(name.to_string());
        Ok(())
    }
}

/// Handle to an open database
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    events: EventSender,
}

impl Database {
    pub(crate) fn new(inner: Arc<DatabaseInner>, events: EventSender) -> Self {
        Self { inner, events }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn version(&self) -> u64 {
        self.inner.version()
    }

    pub fn object_store_names(&self) -> Vec<String> {
        self.inner.store_names()
    }

    /// Begin a transaction scoped to one store
    pub fn transaction(&self, store: &str, mode: TransactionMode) -> Result<Transaction> {
        if self.inner.is_closed() {
            return Err(StorageError::DatabaseClosed(self.inner.name().to_string()));
        }
        if !self.inner.has_store(store) {
            return Err(StorageError::StoreNotFound(store.to_string()));
        }
        Ok(Transaction::new(
            Arc::clone(&self.inner),
            self.events.clone(),
            store,
            mode,
        ))
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name())
            .field("version", &self.version())
            .finish()
    }
}
