//! Error types for webext-storage
//!
//! Provides a unified error type for the substrate and the storage areas.
//! Errors are `Clone` because one substrate failure can be reported to both
//! the failing request and its transaction.

use std::sync::Arc;

use thiserror::Error;

/// Result type alias using StorageError
pub type Result<T> = std::result::Result<T, StorageError>;

/// Unified error type for webext-storage operations
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL is unusable after a failed rollback; reopen the database")]
    WalPoisoned,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Substrate Errors
    // -------------------------------------------------------------------------
    #[error("Invalid database version: {0}")]
    InvalidVersion(u64),

    #[error("Requested version {requested} is lower than existing version {existing}")]
    VersionConflict { requested: u64, existing: u64 },

    #[error("Object store already exists: {0}")]
    StoreExists(String),

    #[error("Object store not found: {0}")]
    StoreNotFound(String),

    #[error("Write attempted in a read-only transaction")]
    ReadOnlyTransaction,

    #[error("Transaction is no longer active")]
    TransactionInactive,

    #[error("Transaction was aborted")]
    Aborted,

    #[error("Quota exceeded for store '{store}': {used} bytes over limit of {quota}")]
    QuotaExceeded {
        store: String,
        used: usize,
        quota: usize,
    },

    #[error("Database has been deleted: {0}")]
    DatabaseClosed(String),

    #[error("Substrate event loop is closed")]
    EventLoopClosed,

    // -------------------------------------------------------------------------
    // Storage Area Errors
    // -------------------------------------------------------------------------
    #[error("Failed to open database: {0}")]
    OpenFailed(Box<StorageError>),

    #[error("Transaction failed: {0}")]
    TransactionFailed(Box<StorageError>),

    #[error("Managed storage cannot be modified")]
    ManagedReadOnly,

    #[error("Invalid keys: {0}")]
    InvalidKeys(String),

    #[error("Unknown storage area: {0}")]
    UnknownArea(String),
}

impl StorageError {
    /// Unwrap open/transaction wrappers down to the substrate cause
    pub fn root_cause(&self) -> &StorageError {
        match self {
            StorageError::OpenFailed(inner) | StorageError::TransactionFailed(inner) => {
                inner.root_cause()
            }
            other => other,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(Arc::new(err))
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
