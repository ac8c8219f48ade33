//! Storage Area Module
//!
//! The per-area handles exposed as `local`, `sync` and `managed`.
//!
//! ## Responsibilities
//! - Name the three areas and map each to its object store
//! - Build the right handle per area (`StorageArea::for_area`)
//! - Run every operation in its own single-store transaction
//! - Keep the managed area read-only
//!
//! ## Operation → Transaction
//! ```text
//! get / get_bytes_in_use   readonly   get_all_keys? + get × n
//! set                      readwrite  put × n
//! remove                   readwrite  delete × n
//! clear                    readwrite  clear
//! ```

mod managed;
mod store;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Result, StorageError};
use crate::gatekeeper::Gatekeeper;
use crate::keys::{Items, Keys, RemoveKeys};

pub use managed::ManagedArea;
pub use store::StoreArea;

/// One of the three storage areas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AreaName {
    Local,
    Sync,
    Managed,
}

impl AreaName {
    pub const ALL: [AreaName; 3] = [AreaName::Local, AreaName::Sync, AreaName::Managed];

    /// Area name, also the name of its object store
    pub fn as_str(&self) -> &'static str {
        match self {
            AreaName::Local => "local",
            AreaName::Sync => "sync",
            AreaName::Managed => "managed",
        }
    }
}

impl fmt::Display for AreaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AreaName {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(AreaName::Local),
            "sync" => Ok(AreaName::Sync),
            "managed" => Ok(AreaName::Managed),
            other => Err(StorageError::UnknownArea(other.to_string())),
        }
    }
}

/// Handle to one storage area
pub enum StorageArea {
    /// Backed by the area's object store
    Store(StoreArea),

    /// Read-only, always empty
    Managed(ManagedArea),
}

impl StorageArea {
    /// Build the handle for `name`; the managed area gets the read-only guard
    pub fn for_area(name: AreaName, gatekeeper: Arc<Gatekeeper>) -> Self {
        match name {
            AreaName::Managed => StorageArea::Managed(ManagedArea::new()),
            name => StorageArea::Store(StoreArea::new(name, gatekeeper)),
        }
    }

    pub fn name(&self) -> AreaName {
        match self {
            StorageArea::Store(area) => area.name(),
            StorageArea::Managed(_) => AreaName::Managed,
        }
    }

    pub async fn get(&self, keys: impl Into<Keys>) -> Result<Items> {
        match self {
            StorageArea::Store(area) => area.get(keys.into()).await,
            StorageArea::Managed(area) => area.get(keys.into()).await,
        }
    }

    pub async fn set(&self, items: Items) -> Result<()> {
        match self {
            StorageArea::Store(area) => area.set(items).await,
            StorageArea::Managed(area) => area.set(items).await,
        }
    }

    pub async fn remove(&self, keys: impl Into<RemoveKeys>) -> Result<()> {
        match self {
            StorageArea::Store(area) => area.remove(keys.into()).await,
            StorageArea::Managed(area) => area.remove(keys.into()).await,
        }
    }

    pub async fn clear(&self) -> Result<()> {
        match self {
            StorageArea::Store(area) => area.clear().await,
            StorageArea::Managed(area) => area.clear().await,
        }
    }

    /// Approximate bytes used by the selected keys
    pub async fn get_bytes_in_use(&self, keys: impl Into<Keys>) -> Result<usize> {
        let items = self.get(keys).await?;
        bytes_in_use(&items)
    }
}

/// Byte length of the canonical JSON text of `items`
pub fn bytes_in_use(items: &Items) -> Result<usize> {
    Ok(serde_json::to_string(items)?.len())
}
