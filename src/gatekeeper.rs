//! Database gatekeeper
//!
//! Opens the backing database on first use and makes sure the area stores
//! exist. The opened handle is shared by every area operation; concurrent
//! first callers wait on the same in-flight open. A failed open is not kept,
//! so the next call tries again.

use tokio::sync::OnceCell;

use crate::area::AreaName;
use crate::config::Config;
use crate::error::{Result, StorageError};
use crate::settle::Settle;
use crate::substrate::{Database, Factory};

/// Lazily opened, shared handle to the backing database
pub struct Gatekeeper {
    factory: Factory,
    db_name: String,
    db_version: u64,
    database: OnceCell<Database>,
}

impl Gatekeeper {
    pub fn new(factory: Factory, config: &Config) -> Self {
        Self {
            factory,
            db_name: config.db_name.clone(),
            db_version: config.db_version,
            database: OnceCell::new(),
        }
    }

    /// Get the database handle, opening (and upgrading) it if needed
    pub async fn open_database(&self) -> Result<Database> {
        self.database
            .get_or_try_init(|| self.open_uncached())
            .await
            .cloned()
    }

    /// Whether a handle has been opened already
    pub fn is_open(&self) -> bool {
        self.database.initialized()
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    async fn open_uncached(&self) -> Result<Database> {
        tracing::debug!(db = %self.db_name, version = self.db_version, "Opening database");

        let (settle, pending) = Settle::new();
        let on_success = settle.clone();
        let on_error = settle;

        self.factory
            .open(self.db_name.clone(), self.db_version)
            .on_upgrade_needed(|upgrade| {
                for area in AreaName::ALL {
                    if !upgrade.contains(area.as_str()) {
                        upgrade.create_object_store(area.as_str())?;
                    }
                }
                Ok(())
            })
            .on_success(move |db| {
                on_success.resolve(db);
            })
            .on_error(move |e| {
                on_error.reject(StorageError::OpenFailed(Box::new(e)));
            })
            .submit()
            .map_err(|e| StorageError::OpenFailed(Box::new(e)))?;

        pending.wait().await
    }
}
