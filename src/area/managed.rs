//! Managed area
//!
//! Managed storage is provisioned by an administrator, never by the
//! extension. Nothing provisions it here, so reads are always empty and
//! writes are refused before any database work happens.

use crate::error::{Result, StorageError};
use crate::keys::{Items, Keys, RemoveKeys};

/// Read-only, unpopulated managed area
#[derive(Debug, Clone, Copy, Default)]
pub struct ManagedArea;

impl ManagedArea {
    pub fn new() -> Self {
        Self
    }

    pub async fn get(&self, _keys: Keys) -> Result<Items> {
        Ok(Items::new())
    }

    pub async fn set(&self, _items: Items) -> Result<()> {
        Err(StorageError::ManagedReadOnly)
    }

    pub async fn remove(&self, _keys: RemoveKeys) -> Result<()> {
        Err(StorageError::ManagedReadOnly)
    }

    pub async fn clear(&self) -> Result<()> {
        Err(StorageError::ManagedReadOnly)
    }
}
