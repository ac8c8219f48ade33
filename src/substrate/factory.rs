//! Database factory
//!
//! Entry point of the substrate: opens (creating or upgrading) databases by
//! name and version. Opening is asynchronous; the outcome is reported through
//! the callbacks registered on the `OpenRequest`.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Config, WalSyncStrategy};
use crate::error::{Result, StorageError};

use super::database::DatabaseInner;
use super::event_loop::{self, EventSender, Job};
use super::{Database, UpgradeContext};

pub(crate) type UpgradeFn = Box<dyn FnOnce(&mut UpgradeContext<'_>) -> Result<()> + Send>;
type SuccessFn = Box<dyn FnOnce(Database) + Send>;
type DeletedFn = Box<dyn FnOnce() + Send>;
type ErrorFn = Box<dyn FnOnce(StorageError) + Send>;

/// Opens databases on the substrate event loop
#[derive(Clone)]
pub struct Factory {
    events: EventSender,
}

impl Factory {
    /// Start a substrate with its own event loop
    ///
    /// Creates `data_dir` when persistence is configured.
    pub fn new(config: &Config) -> Result<Self> {
        if let Some(dir) = &config.data_dir {
            fs::create_dir_all(dir)?;
        }

        let events = event_loop::spawn(Registry::new(config))?;
        Ok(Self { events })
    }

    /// Prepare a request to open `name` at `version`
    pub fn open(&self, name: impl Into<String>, version: u64) -> OpenRequest {
        OpenRequest {
            name: name.into(),
            version,
            events: self.events.clone(),
            on_upgrade_needed: None,
            on_success: None,
            on_error: None,
        }
    }

    /// Prepare a request to delete `name` together with its log
    ///
    /// Handles still open on the database are closed: their new transactions
    /// and commits fail. Deleting a database that does not exist succeeds.
    pub fn delete_database(&self, name: impl Into<String>) -> DeleteRequest {
        DeleteRequest {
            name: name.into(),
            events: self.events.clone(),
            on_success: None,
            on_error: None,
        }
    }
}

/// A pending open; nothing happens until `submit()`
pub struct OpenRequest {
    name: String,
    version: u64,
    events: EventSender,
    on_upgrade_needed: Option<UpgradeFn>,
    on_success: Option<SuccessFn>,
    on_error: Option<ErrorFn>,
}

impl OpenRequest {
    /// Called once, before success, when the stored version is older
    pub fn on_upgrade_needed(
        mut self,
        callback: impl FnOnce(&mut UpgradeContext<'_>) -> Result<()> + Send + 'static,
    ) -> Self {
        self.on_upgrade_needed = Some(Box::new(callback));
        self
    }

    pub fn on_success(mut self, callback: impl FnOnce(Database) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl FnOnce(StorageError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Queue the open on the event loop
    pub fn submit(self) -> Result<()> {
        let events = self.events.clone();
        events
            .send(Job::Open(self))
            .map_err(|_| StorageError::EventLoopClosed)
    }
}

/// A pending deletion; nothing happens until `submit()`
pub struct DeleteRequest {
    name: String,
    events: EventSender,
    on_success: Option<DeletedFn>,
    on_error: Option<ErrorFn>,
}

impl DeleteRequest {
    pub fn on_success(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl FnOnce(StorageError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Queue the deletion on the event loop
    pub fn submit(self) -> Result<()> {
        let events = self.events.clone();
        events
            .send(Job::Delete(self))
            .map_err(|_| StorageError::EventLoopClosed)
    }
}

/// Databases known to one event loop, keyed by name
///
/// Owned by the loop thread, so it needs no locking.
pub(crate) struct Registry {
    databases: HashMap<String, Arc<DatabaseInner>>,
    data_dir: Option<PathBuf>,
    sync_strategy: WalSyncStrategy,
    quota_bytes: Option<usize>,
}

impl Registry {
    pub(crate) fn new(config: &Config) -> Self {
        Self {
            databases: HashMap::new(),
            data_dir: config.data_dir.clone(),
            sync_strategy: config.wal_sync_strategy,
            quota_bytes: config.quota_bytes,
        }
    }

    /// Handle an open request and fire its callbacks
    pub(crate) fn open(&mut self, request: OpenRequest) {
        let OpenRequest {
            name,
            version,
            events,
            on_upgrade_needed,
            on_success,
            on_error,
        } = request;

        match self.open_database(&name, version, on_upgrade_needed) {
            Ok(inner) => {
                tracing::debug!(db = %name, version, "Database opened");
                if let Some(callback) = on_success {
                    callback(Database::new(inner, events));
                }
            }
            Err(e) => {
                tracing::warn!(db = %name, version, "Database open failed: {}", e);
                if let Some(callback) = on_error {
                    callback(e);
                }
            }
        }
    }

    /// Steps:
    /// 1. Reject version 0
    /// 2. Reuse the registered database, or load it from its WAL
    /// 3. Refuse downgrades
    /// 4. Upgrade when the requested version is newer
    fn open_database(
        &mut self,
        name: &str,
        version: u64,
        upgrade: Option<UpgradeFn>,
    ) -> Result<Arc<DatabaseInner>> {
        if version == 0 {
            return Err(StorageError::InvalidVersion(version));
        }

        let inner = match self.databases.get(name) {
            Some(db) => Arc::clone(db),
            None => Arc::new(self.load(name)?),
        };

        let existing = inner.version();
        if version < existing {
            return Err(StorageError::VersionConflict {
                requested: version,
                existing,
            });
        }
        if version > existing {
            inner.upgrade(version, upgrade)?;
        }

        self.databases.insert(name.to_string(), Arc::clone(&inner));
        Ok(inner)
    }

    /// Handle a delete request and fire its callbacks
    pub(crate) fn delete(&mut self, request: DeleteRequest) {
        let DeleteRequest {
            name,
            on_success,
            on_error,
            ..
        } = request;

        match self.delete_database(&name) {
            Ok(()) => {
                tracing::debug!(db = %name, "Database deleted");
                if let Some(callback) = on_success {
                    callback();
                }
            }
            Err(e) => {
                tracing::warn!(db = %name, "Database delete failed: {}", e);
                if let Some(callback) = on_error {
                    callback(e);
                }
            }
        }
    }

    fn delete_database(&mut self, name: &str) -> Result<()> {
        if let Some(db) = self.databases.remove(name) {
            db.close();
        }

        if let Some(path) = self.wal_path(name).filter(|p| p.exists()) {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn load(&self, name: &str) -> Result<DatabaseInner> {
        DatabaseInner::load(name, self.wal_path(name), self.sync_strategy, self.quota_bytes)
    }

    fn wal_path(&self, name: &str) -> Option<PathBuf> {
        self.data_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.wal", name)))
    }
}
