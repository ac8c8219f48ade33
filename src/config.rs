//! Configuration for webext-storage
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Main configuration for a storage instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Database Configuration
    // -------------------------------------------------------------------------
    /// Name of the backing database
    pub db_name: String,

    /// Version requested when opening the backing database
    pub db_version: u64,

    // -------------------------------------------------------------------------
    // Persistence Configuration
    // -------------------------------------------------------------------------
    /// Directory holding one WAL per database, `None` keeps everything in memory
    /// Internal structure:
    ///   {data_dir}/
    ///     └── {db_name}.wal
    pub data_dir: Option<PathBuf>,

    /// Sync strategy: how often to fsync the WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // Limits
    // -------------------------------------------------------------------------
    /// Per-store byte quota (JSON size of keys and values), `None` is unlimited
    pub quota_bytes: Option<usize>,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Config {
    /// Database name used by the extension storage shim
    pub const DEFAULT_DB_NAME: &'static str = "BrowserStoragePolyfill";

    /// Schema version of the backing database
    pub const DEFAULT_DB_VERSION: u64 = 1;

    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_name: Self::DEFAULT_DB_NAME.to_string(),
            db_version: Self::DEFAULT_DB_VERSION,
            data_dir: None,
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            quota_bytes: None,
        }
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the backing database name
    pub fn db_name(mut self, name: impl Into<String>) -> Self {
        self.config.db_name = name.into();
        self
    }

    /// Set the backing database version
    pub fn db_version(mut self, version: u64) -> Self {
        self.config.db_version = version;
        self
    }

    /// Persist databases under this directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = Some(path.into());
        self
    }

    /// Keep databases in memory only
    pub fn in_memory(mut self) -> Self {
        self.config.data_dir = None;
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the per-store quota (in bytes)
    pub fn quota_bytes(mut self, quota: usize) -> Self {
        self.config.quota_bytes = Some(quota);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
