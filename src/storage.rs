//! Storage namespace
//!
//! `BrowserStorage` is what gets installed as `browser.storage`: the three
//! area handles sharing one gatekeeper, plus the change-listener registry.

use std::sync::Arc;

use crate::area::{AreaName, StorageArea};
use crate::changes::{OnChanged, SignalBus, StorageSignal};
use crate::config::Config;
use crate::error::Result;
use crate::gatekeeper::Gatekeeper;
use crate::substrate::Factory;

/// The emulated `browser.storage` namespace
pub struct BrowserStorage {
    local: StorageArea,
    sync: StorageArea,
    managed: StorageArea,
    on_changed: OnChanged,
    gatekeeper: Arc<Gatekeeper>,
}

impl BrowserStorage {
    /// Build the namespace on an existing substrate
    ///
    /// Nothing is opened until the first area operation.
    pub fn new(factory: Factory, config: &Config, signal: Arc<dyn StorageSignal>) -> Self {
        let gatekeeper = Arc::new(Gatekeeper::new(factory, config));

        Self {
            local: StorageArea::for_area(AreaName::Local, Arc::clone(&gatekeeper)),
            sync: StorageArea::for_area(AreaName::Sync, Arc::clone(&gatekeeper)),
            managed: StorageArea::for_area(AreaName::Managed, Arc::clone(&gatekeeper)),
            on_changed: OnChanged::new(signal),
            gatekeeper,
        }
    }

    /// Start a substrate for `config` and build the namespace on it,
    /// with a private signal bus
    pub fn open(config: &Config) -> Result<Self> {
        let factory = Factory::new(config)?;
        Ok(Self::new(factory, config, Arc::new(SignalBus::new())))
    }

    pub fn local(&self) -> &StorageArea {
        &self.local
    }

    pub fn sync(&self) -> &StorageArea {
        &self.sync
    }

    pub fn managed(&self) -> &StorageArea {
        &self.managed
    }

    pub fn area(&self, name: AreaName) -> &StorageArea {
        match name {
            AreaName::Local => &self.local,
            AreaName::Sync => &self.sync,
            AreaName::Managed => &self.managed,
        }
    }

    pub fn on_changed(&self) -> &OnChanged {
        &self.on_changed
    }

    pub fn gatekeeper(&self) -> &Gatekeeper {
        &self.gatekeeper
    }
}
